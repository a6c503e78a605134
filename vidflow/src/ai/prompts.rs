//! Prompt text for the content services.

use super::{ArticleRequest, CtaVariant};

pub const LINKS_SYSTEM_PROMPT: &str = "You read transcripts of short technical videos. \
List every external resource the speaker refers to that a viewer would want a link for \
(documentation, libraries, repositories, articles, tools). \
Answer with a JSON array of short descriptions and nothing else. \
Answer with [] if there are none.";

pub const ARTICLE_SYSTEM_PROMPT: &str = "You turn video transcripts into blog articles written \
in Markdown. Keep the speaker's voice. Match the tone and structure of the example articles \
when they are given. Include the code sample where it helps the explanation and cite the \
provided links inline. Do not add a title heading or front matter.";

pub const TITLE_SYSTEM_PROMPT: &str = "You write titles for technical blog articles. \
Answer with a single title of at most ten words, without quotes or trailing punctuation.";

pub fn cta_system_prompt() -> String {
    let variants = CtaVariant::ALL
        .iter()
        .map(|v| v.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "You choose the call to action shown at the start of a short video. \
         Pick the one that best fits the transcript. Answer with exactly one of: {variants}."
    )
}

/// Body of the user message shared by the article and title requests.
pub fn article_user_prompt(request: &ArticleRequest) -> String {
    let mut prompt = String::new();

    if !request.recent_articles.is_empty() {
        prompt.push_str("Previous articles, for style reference:\n\n");
        for (i, article) in request.recent_articles.iter().enumerate() {
            prompt.push_str(&format!("<article index=\"{}\">\n{}\n</article>\n\n", i + 1, article));
        }
    }

    if let Some(code) = request.code.as_ref().filter(|c| !c.code_content.is_empty()) {
        prompt.push_str(&format!(
            "Code sample ({}):\n```\n{}\n```\n\n",
            code.code_path, code.code_content
        ));
    }

    if !request.links.is_empty() {
        prompt.push_str("Links:\n");
        for link in &request.links {
            prompt.push_str(&format!("- {}: {}\n", link.description, link.url));
        }
        prompt.push('\n');
    }

    prompt.push_str("Transcript:\n");
    prompt.push_str(&request.transcript);
    prompt
}

/// Extract a JSON string array from a model answer that may wrap it in prose
/// or a code fence.
pub fn parse_string_array(answer: &str) -> Option<Vec<String>> {
    let start = answer.find('[')?;
    let end = answer.rfind(']')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&answer[start..=end]).ok()
}

/// Strip quotes and stray markdown from a one-line answer.
pub fn clean_title(answer: &str) -> String {
    answer
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .trim_start_matches('#')
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '*')
        .trim()
        .to_string()
}
