//! Prompt text the loop writes into transcripts and recovery files.

use std::path::Path;

/// Injected after the same first tool call repeats three iterations in a row.
pub const LOOP_BREAKER_MESSAGE: &str = "You have issued the same tool call three times in a row. \
Stop repeating it. Use the results you already have to make progress, or try a different approach.";

/// Built-in system prompt naming the workspace and the available tools.
pub fn system_prompt(workspace: &Path, tool_names: &[String]) -> String {
    format!(
        "You are DomiClaw, an AI coding assistant with persistent memory.\n\n\
         Workspace: {}\n\
         Available tools: {}\n\n\
         Work inside the workspace. Read files before changing them and verify the result after. \
         Long-term memory lives in MEMORY.md; daily notes live under memory/.\n\
         When you finish a phase of work, say so plainly (for example \"Phase complete\" or \"Checkpoint\").",
        workspace.display(),
        tool_names.join(", ")
    )
}

/// Recovery prompt written after a context overflow.
pub fn gap_analysis_prompt(memory_context: &str) -> String {
    format!(
        r#"# Session Recovery - Gap Analysis

You are resuming from a context overflow. Before continuing:

1. **Review Memory Context** below
2. **Identify Knowledge Gaps** - What information might be missing?
3. **Read Relevant Files** - Use file tools to recover context
4. **Continue the Task** - Resume where you left off

## Important
- Do NOT make assumptions about previous work
- Verify file states before making changes
- Check git status if applicable

---

{memory_context}

---

Please perform gap analysis and then continue the task.
"#
    )
}
