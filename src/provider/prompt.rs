use crate::i18n::LanguageRegistry;

/// Build the system prompt for translating one UI string
pub fn build_system_prompt(
    source_language: &str,
    target_language: &str,
    preserve_formatting: bool,
) -> String {
    let registry = LanguageRegistry::get();
    let source = registry.describe(source_language);
    let target = registry.describe(target_language);

    let mut prompt = format!(
        r#"You are a professional software localizer. Translate the user interface text you are given from {} to {}.

## Translation Rules

### DO NOT translate:
- Interpolation placeholders (e.g., {{name}}, {{{{count}}}}, %s, %d, %1$s)
- HTML or XML tags and their attributes
- URLs, e-mail addresses and file paths
- Product and brand names

### DO translate:
- All natural-language text
- Text inside markup tags

### Output:
- Reply with the translated text only
- No explanations, notes, quotes or alternatives"#,
        source, target
    );

    if preserve_formatting {
        prompt.push_str(
            r#"

### Formatting:
- Keep leading and trailing whitespace, line breaks and punctuation style
- Keep the same capitalization style (Title Case stays Title Case)
- Keep the text roughly the same length; it is shown in a user interface"#,
        );
    }

    prompt
}

/// Build the user prompt carrying the text and optional key context
pub fn build_user_prompt(text: &str, context: Option<&str>) -> String {
    match context.filter(|c| !c.trim().is_empty()) {
        Some(context) => format!(
            "Context (do not translate): {}\n\nText to translate:\n{}",
            context, text
        ),
        None => format!("Text to translate:\n{}", text),
    }
}

/// Strip wrapping a model sometimes adds around its answer
pub fn clean_translation(original: &str, translated: &str) -> String {
    let trimmed = translated.trim();
    let quoted = |s: &str, q: char| s.len() >= 2 && s.starts_with(q) && s.ends_with(q);

    let unwrapped = ['"', '\'', '`']
        .into_iter()
        .find(|&q| quoted(trimmed, q) && !quoted(original.trim(), q))
        .map(|q| trimmed.trim_matches(q))
        .unwrap_or(trimmed);

    // Source whitespace at the edges is meaningful in UI strings
    let leading = &original[..original.len() - original.trim_start().len()];
    let trailing = &original[original.trim_end().len()..];
    format!("{}{}{}", leading, unwrapped, trailing)
}
