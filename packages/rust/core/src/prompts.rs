//! Prompt texts and the message sets built from them.

use seoscribe_llm::ChatMessage;

/// Standing instructions sent as the system message for article runs.
pub const SYSTEM_MSG: &str = "\
I want you to act as a content writer and a very proficient SEO writer who writes fluent English.
Responses must be in proper MARKDOWN format. Numbered lists and bullet points must also be in MARKDOWN format. ```You must follow the rules in the given example```.

Headings should look like the example below, and any numbering must be inside the markdown heading. ```Every sub-heading must start and end with an empty newline```.

Title Example:
# Personal Finance For Beginners
Example Heading:
## Build an Emergency Fund
or
## 10.5 Build an Emergency Fund
Ignore Example Heading:
10. ## Build an Emergency Fund
Example Conclusion:
## Conclusion
conclusion text goes here
Frequently Asked Questions:
Example Question:
**Q: When should I seek professional advice?**
Example Answer:
A: If you feel overwhelmed or unsure about managing your personal finances, it's a good idea to seek professional advice from a reputable financial advisor.
";

/// Article in one step: outline first, then the article. Placeholder `{keyword}`.
pub const ARTICLE_PROMPT: &str = "\
I want you to act as a content writer and a very proficient SEO writer who writes fluent English. First, create the outline of the article, then write the article based on that outline. Bold the heading of the second table using Markdown. Write the outline separately before the article, with at least 15 headings and subheadings (including H1, H2, H3 and H4 headings in proper markdown format). Then write the article step by step following that outline. Write a 2000-word, 100% unique, SEO-optimized, human-written article in English with at least 15 headings and subheadings (including H1, H2, H3 and H4 headings in proper markdown format) that covers the topic provided in the prompt. Write the article in your own words rather than copying and pasting from other sources. Consider perplexity and burstiness when creating content, ensuring high levels of both without losing specificity or context. Use fully detailed paragraphs that engage the reader. Write in a conversational style as written by a human (use an informal tone, utilize personal pronouns, keep it simple, engage the reader, use the active voice, keep it brief, use rhetorical questions, and incorporate analogies and metaphors). End with a conclusion paragraph and 10 unique FAQs with answers after the conclusion. Do not number the questions; separate each question and answer with a new line and use proper markdown format. It is important to bold the title and all headings of the article, to OUTPUT every element as PROPER MARKDOWN, and to use appropriate headings for H tags.
IMPORTANT: RESPONSES MUST BE IN PROPER MARKDOWN FORMAT. FAQs must follow the rules below.

Now write an article on this topic: \"{keyword}\"
";

/// Outline only. Placeholder `{keyword}`.
pub const OUTLINE_PROMPT: &str = "\
I want you to act as a content writer and a very proficient SEO writer who writes fluent English. Create the outline of an article with at least 15 headings and subheadings (including H1, H2, H3 and H4 headings). End with a conclusion, then an H2 named Frequently Asked Questions: followed by 10 unique FAQs. It is important to bold the title and all headings, and to use appropriate headings for H tags. Do not add Roman numerals, section numbers or H2/H3 labels before any subheading name.

Now write an outline on this topic: \"{keyword}\"
";

/// Full article from a stored outline. Placeholder `{outlines}`.
pub const OUTLINE_ARTICLE_PROMPT: &str = "\
{outlines}

I want you to act as a content writer and a very proficient SEO writer who writes fluent English. Bold the heading of the second table using Markdown. Write a 2500-word, 100% unique, SEO-optimized, human-written article in English based on the outline headings and subheadings above (including H1, H2, H3 and H4 headings) that covers the topic provided in the prompt. Add a brief introduction after every H2 subheading. Add lists and bullet points where applicable. Write the article in your own words rather than copying and pasting from other sources. Consider perplexity and burstiness when creating content, ensuring high levels of both without losing specificity or context. Use fully detailed paragraphs that engage the reader. Write in a conversational style as written by a human (use an informal tone, utilize personal pronouns, keep it simple, engage the reader, use the active voice, keep it brief, use rhetorical questions, and incorporate analogies and metaphors). Also answer all the FAQs. IMPORTANT: RESPONSES MUST BE IN PROPER MARKDOWN FORMAT.
FAQs must follow the rules below.
";

/// Substitute `{keyword}` in a keyword prompt.
pub fn render_keyword_prompt(template: &str, keyword: &str) -> String {
    template.replace("{keyword}", keyword)
}

/// Substitute `{outlines}` in the outline-article prompt.
pub fn render_outline_prompt(outline: &str) -> String {
    OUTLINE_ARTICLE_PROMPT.replace("{outlines}", outline.trim())
}

/// System instructions plus the one-step article request.
pub fn article_messages(keyword: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_MSG),
        ChatMessage::user(render_keyword_prompt(ARTICLE_PROMPT, keyword)),
    ]
}

/// The outline request alone; outline runs carry no system message.
pub fn outline_messages(keyword: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(render_keyword_prompt(OUTLINE_PROMPT, keyword))]
}

/// System instructions plus the article-from-outline request.
pub fn outline_article_messages(outline: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_MSG),
        ChatMessage::user(render_outline_prompt(outline)),
    ]
}

#[cfg(test)]
mod tests {
    use seoscribe_llm::Role;

    use super::*;

    #[test]
    fn keyword_is_substituted() {
        let prompt = render_keyword_prompt(ARTICLE_PROMPT, "best budget apps");
        assert!(prompt.ends_with("on this topic: \"best budget apps\"\n"));
        assert!(!prompt.contains("{keyword}"));
    }

    #[test]
    fn outline_leads_the_article_prompt() {
        let prompt = render_outline_prompt("\n# Budget Apps\n## Why Budget\n");
        assert!(prompt.starts_with("# Budget Apps\n## Why Budget\n\nI want you"));
    }

    #[test]
    fn message_sets_have_expected_roles() {
        let roles = |msgs: Vec<ChatMessage>| msgs.iter().map(|m| m.role).collect::<Vec<_>>();
        assert_eq!(roles(article_messages("x")), vec![Role::System, Role::User]);
        assert_eq!(roles(outline_messages("x")), vec![Role::User]);
        assert_eq!(roles(outline_article_messages("x")), vec![Role::System, Role::User]);
    }
}
