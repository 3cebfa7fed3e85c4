//! Model prompts
//!
//! Fixed system instructions plus the user-message builders that render a
//! book (and optionally a reader's sensitivity profile) as prompt text.

use safereads_common::models::{tolerance_label, Book, SensitivitySettings};

const RESPONSE_SHAPE: &str = r#"Respond with a single JSON object:

{
  "verdict": "safe" | "caution" | "warning" | "no_verdict",
  "ageRecommendation": "string such as 'All ages', '12+' or '16+'",
  "summary": "Two or three plain-language sentences telling a parent what is in this book.",
  "contentFlags": [
    {
      "category": "Violence" | "Language" | "Sexual Content" | "Substance Use" | "Dark Themes" | "Religious Content",
      "severity": "none" | "mild" | "moderate" | "heavy",
      "details": "Short factual description of the specific content in this category"
    }
  ],
  "reasoning": "Detailed reasoning behind the verdict and the age recommendation."
}"#;

const VERDICT_GUIDELINES: &str = r#"Verdicts:
- "safe": suitable for most young readers (about 8 and up), no significant mature themes
- "caution": some mature elements a parent should know about (about 12 and up)
- "warning": significant mature themes, best for older teens or adults (about 16 and up)
- "no_verdict": not enough information to decide

Rules:
- Always return contentFlags for all 6 categories (Violence, Language, Sexual Content, Substance Use, Dark Themes, Religious Content), using severity "none" where nothing applies
- Be concrete ("battlefield deaths described in detail" rather than "violence")
- Describe what the content is; do not judge whether it is good or bad
- Draw on what is widely known about the book, its reviews and its content
- When unsure about specific content, say so in the reasoning and lean toward caution"#;

/// Objective review, identical for every reader
pub fn objective_system_prompt() -> String {
    format!(
        "You are SafeReads, a book content analyst. You write objective, factual content \
         reviews so parents can make informed reading decisions for their families.\n\n\
         You will receive book metadata (title, authors, description, categories). Give a \
         neutral assessment of the content. Do NOT tailor it to any particular reader.\n\n\
         {}\n\n{}\n- Base the age recommendation on general community standards, not on any \
         single family's values",
        RESPONSE_SHAPE, VERDICT_GUIDELINES
    )
}

/// Review tailored to a reader's sensitivity profile
pub fn personalized_system_prompt() -> String {
    format!(
        "You are SafeReads, a book content analyst. You write factual content reviews so \
         parents can make informed reading decisions for their families.\n\n\
         You will receive book metadata and the reader's sensitivity profile: a tolerance \
         level for each content category. Judge the verdict against that profile. A category \
         the reader has very low tolerance for should raise the verdict even at mild \
         severity; a category with very high tolerance should rarely raise it on its own.\n\n\
         {}\n\n{}",
        RESPONSE_SHAPE, VERDICT_GUIDELINES
    )
}

/// Book metadata rendered as prompt context
pub fn build_book_context(book: &Book) -> String {
    let mut lines = vec![
        format!("Title: {}", book.title),
        format!("Author(s): {}", book.authors.join(", ")),
    ];

    if let Some(published) = book.published_date.as_deref().filter(|p| !p.is_empty()) {
        lines.push(format!("Published: {}", published));
    }
    if let Some(pages) = book.page_count.filter(|p| *p > 0) {
        lines.push(format!("Page count: {}", pages));
    }
    if let Some(categories) = book.categories.as_ref().filter(|c| !c.is_empty()) {
        lines.push(format!("Categories: {}", categories.join(", ")));
    }
    if let Some(description) = book.description.as_deref().filter(|d| !d.is_empty()) {
        lines.push(format!("\nDescription:\n{}", description));
    }

    lines.join("\n")
}

/// Sensitivity profile rendered as qualitative tolerance labels
pub fn build_profile_context(settings: &SensitivitySettings) -> String {
    settings
        .dimensions()
        .iter()
        .map(|(name, value)| format!("- {}: {} ({}/10)", name, tolerance_label(*value), value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Complete user message for a verdict request
pub fn build_user_message(book: &Book, profile: Option<&SensitivitySettings>) -> String {
    let mut message = format!("## Book Information\n{}", build_book_context(book));

    if let Some(settings) = profile {
        message.push_str("\n\n## Reader Sensitivity Profile\n");
        message.push_str(&build_profile_context(settings));
    }

    message.push_str("\n\nAnalyze this book and return your content review as JSON.");
    message
}

/// Instruction for reading a book cover photo
pub const COVER_IDENTIFICATION_PROMPT: &str = "This is a photo of a book cover. Identify the \
book. Respond with a JSON object {\"title\": \"...\", \"author\": \"...\"}. Use the exact \
title printed on the cover. Use an empty string for author if none is visible. If you cannot \
read a title, respond with {\"title\": \"\", \"author\": \"\"}.";

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn book() -> Book {
        Book {
            id: Uuid::new_v4(),
            google_books_id: None,
            open_library_key: None,
            title: "Hatchet".to_string(),
            authors: vec!["Gary Paulsen".to_string(), "Second Author".to_string()],
            description: Some("A boy survives alone in the wilderness.".to_string()),
            cover_url: None,
            page_count: Some(195),
            published_date: Some("1987".to_string()),
            categories: Some(vec!["Juvenile Fiction".to_string()]),
            isbn10: None,
            isbn13: None,
            maturity_rating: None,
            average_rating: None,
            ratings_count: None,
        }
    }

    #[test]
    fn test_book_context_layout() {
        let context = build_book_context(&book());
        assert_eq!(
            context,
            "Title: Hatchet\n\
             Author(s): Gary Paulsen, Second Author\n\
             Published: 1987\n\
             Page count: 195\n\
             Categories: Juvenile Fiction\n\
             \nDescription:\nA boy survives alone in the wilderness."
        );
    }

    #[test]
    fn test_book_context_skips_missing_fields() {
        let mut sparse = book();
        sparse.published_date = None;
        sparse.page_count = Some(0);
        sparse.description = None;
        sparse.categories = Some(vec![]);

        let context = build_book_context(&sparse);
        assert_eq!(
            context,
            "Title: Hatchet\nAuthor(s): Gary Paulsen, Second Author"
        );
    }

    #[test]
    fn test_profile_section_only_when_given() {
        let objective = build_user_message(&book(), None);
        assert!(objective.starts_with("## Book Information\n"));
        assert!(!objective.contains("Sensitivity Profile"));
        assert!(objective.ends_with("return your content review as JSON."));

        let settings = SensitivitySettings {
            violence: 2,
            religious_sensitivity: 9,
            ..Default::default()
        };
        let personalized = build_user_message(&book(), Some(&settings));
        assert!(personalized.contains("- Violence: very low tolerance (2/10)"));
        assert!(personalized.contains("- Religious Sensitivity: very high tolerance (9/10)"));
        assert!(personalized.contains("- Language: moderate tolerance (5/10)"));
    }

    const CONTENT_CATEGORIES: [&str; 6] = [
        "Violence",
        "Language",
        "Sexual Content",
        "Substance Use",
        "Dark Themes",
        "Religious Content",
    ];

    #[test]
    fn test_system_prompts_name_every_category() {
        for prompt in [objective_system_prompt(), personalized_system_prompt()] {
            for category in CONTENT_CATEGORIES {
                assert!(prompt.contains(category), "missing {}", category);
            }
            assert!(prompt.contains("no_verdict"));
        }
    }
}
