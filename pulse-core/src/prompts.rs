//! Prompt text for the optional text-generation collaborator.

pub const SYSTEM_PULSE: &str = "You are Pulse: a calm, minimal, high-signal workday planner.
Tone: concise, grounded, helpful. No hype. No filler.
Explain decisions in plain English.";

fn bullets(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        return format!("- {empty}");
    }
    items
        .iter()
        .map(|x| format!("- {x}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn now_reason_prompt(task_title: &str, task_notes: &str, block_label: &str) -> String {
    let notes = if task_notes.trim().is_empty() { "(none)" } else { task_notes };
    format!(
        "Current schedule block: {block_label}

Next task:
Title: {task_title}
Notes: {notes}

Write ONE short sentence explaining why this is the best task to do now.
Max 20 words. No fluff."
    )
}

pub fn replan_explain_prompt(changes: &[String], locked_blocks: &[String]) -> String {
    let locks = if locked_blocks.is_empty() {
        "none".to_string()
    } else {
        locked_blocks.join(", ")
    };
    let changes = bullets(changes, "(no explicit changes)");
    format!(
        "A schedule was replanned. Locked blocks: {locks}.
Mechanical changes:
{changes}

Write a calm 2-3 sentence explanation for a UI banner.
No hype. No jargon. Don't repeat the bullet list verbatim."
    )
}

pub fn end_of_day_review_prompt(planned: &[String], done: &[String], blocked: &[String]) -> String {
    format!(
        "Write a short end-of-day review.

Planned today:
{}

Completed:
{}

Blocked/stuck:
{}

Write 3 short paragraphs:
1) What went well
2) What caused friction
3) One practical adjustment for tomorrow",
        bullets(planned, "(none)"),
        bullets(done, "(none)"),
        bullets(blocked, "(none)"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_prompt_marks_missing_notes() {
        let p = now_reason_prompt("Ship feature", "", "Deep Work");
        assert!(p.starts_with("Current schedule block: Deep Work"));
        assert!(p.contains("Notes: (none)"));
    }

    #[test]
    fn replan_prompt_lists_changes() {
        let p = replan_explain_prompt(&["Moved task #7 from Admin → Focus.".to_string()], &[]);
        assert!(p.contains("Locked blocks: none."));
        assert!(p.contains("- Moved task #7"));

        let p = replan_explain_prompt(&[], &["admin-2".to_string(), "focus-3".to_string()]);
        assert!(p.contains("Locked blocks: admin-2, focus-3."));
        assert!(p.contains("- (no explicit changes)"));
    }
}
