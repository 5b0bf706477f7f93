//! HTML for the single form page.
//!
//! Handlers never write markup themselves; they return a [`RenderInstruction`]
//! and this module turns it into a document.

use crate::ingest::ACCEPTED_EXTENSIONS;
use crate::models::ImagePart;

pub const PAGE_TITLE: &str = "Multilanguage Invoice Extractor";
pub const HEADER: &str = "Multi-language Invoice Extractor";

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Answer(String),
    Error(String),
}

/// Everything the page needs to draw itself after an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderInstruction {
    /// Echoed back into the prompt field.
    pub user_text: String,
    pub preview: Option<ImagePart>,
    pub outcome: Option<Outcome>,
}

impl RenderInstruction {
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn answer(user_text: String, preview: Option<ImagePart>, text: String) -> Self {
        Self {
            user_text,
            preview,
            outcome: Some(Outcome::Answer(text)),
        }
    }

    pub fn error(user_text: String, preview: Option<ImagePart>, message: String) -> Self {
        Self {
            user_text,
            preview,
            outcome: Some(Outcome::Error(message)),
        }
    }
}

pub fn render_page(view: &RenderInstruction) -> String {
    let accept = ACCEPTED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect::<Vec<_>>()
        .join(",");

    let preview = view
        .preview
        .as_ref()
        .map(|image| {
            format!(
                "<figure><img src=\"{}\" alt=\"Uploaded Image\" style=\"width:100%\"><figcaption>Uploaded Image</figcaption></figure>\n",
                escape_html(&image.to_data_url())
            )
        })
        .unwrap_or_default();

    let outcome = match &view.outcome {
        Some(Outcome::Answer(text)) => format!(
            "<section id=\"response\"><h3>The response is:</h3><pre style=\"white-space:pre-wrap\">{}</pre></section>\n",
            escape_html(text)
        ),
        Some(Outcome::Error(message)) => format!(
            "<div class=\"error\" role=\"alert\">{}</div>\n",
            escape_html(message)
        ),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; max-width: 46rem; margin: 2rem auto; }}
.error {{ background: #fdecea; color: #611a15; padding: .75rem; border-radius: 4px; }}
</style>
</head>
<body>
<h1>{header}</h1>
<form method="post" action="/submit" enctype="multipart/form-data">
<p><label for="input">Input Prompt:</label><br><input type="text" id="input" name="input" value="{user_text}" style="width:100%"></p>
<p><label for="image">Choose an image of the invoice</label><br><input type="file" id="image" name="image" accept="{accept}"></p>
<p><button type="submit">Tell me about the invoice</button></p>
</form>
{preview}{outcome}</body>
</html>
"#,
        title = PAGE_TITLE,
        header = HEADER,
        user_text = escape_html(&view.user_text),
        accept = accept,
        preview = preview,
        outcome = outcome,
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
