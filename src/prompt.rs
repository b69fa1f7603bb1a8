//! # Prompt composition
//!
//! Renders the instructions, the retrieved exemplars, and the incoming document
//! into the single user message sent to the chat model:
//!
//! ```text
//! <REPLY_INSTRUCTIONS>
//! --- 最相似案例 ---
//!
//! 【來文1】
//! 主旨：<subject of exemplar 1>
//! 說明：<body of exemplar 1>
//! 【回文1】
//! <reply to exemplar 1>
//! ...
//!
//! --- 本次來文內容 ---
//! <query>
//! ```
//!
//! Composition is pure: the same query and results always produce the same text.

use crate::error::{ReplyError, Result};
use crate::search::SearchResult;

/// Policy text that leads every prompt.
pub const REPLY_INSTRUCTIONS: &str = "請參考下列最相似的來文及回復案例，撰寫符合公文格式的回文，並且參考最相似案例回答之邏輯、內容及引用的法條與說明進行回答，不在以下最相似案例中引用的法條不要使用，必須保持中立的立場進行撰寫，撰寫內容不可帶有主觀判定個案是否合理或是否合法，例如：不可以直接判斷公司某個行為是否超出合理範圍，但可以說明當發生什麼情況下會違反什麼法規，內容中有可參考到法條的必須明列且正確的列出參考是第幾條第幾項，法條文字內容需從最相似案例中進行參考，不可以自行生成，如果沒有可參考的法源依據則必須告知法無明文規定。";

pub const EXEMPLARS_HEADER: &str = "--- 最相似案例 ---";
pub const QUERY_HEADER: &str = "\n--- 本次來文內容 ---";

const SUBJECT_MARKER: &str = "主旨：";
/// Separates an exemplar's subject from its explanation body.
pub const EXPLANATION_MARKER: &str = "說明：";

/// Split an exemplar document into its subject and explanation body.
///
/// Every `主旨：` marker is dropped from the subject, wherever it appears.
/// `position` is the 1-based exemplar number, used in the error.
pub fn split_exemplar(q: &str, position: usize) -> Result<(String, &str)> {
    let (head, body) =
        q.split_once(EXPLANATION_MARKER)
            .ok_or_else(|| ReplyError::MalformedExemplar {
                position,
                reason: format!("missing `{EXPLANATION_MARKER}` delimiter"),
            })?;
    let subject = head.replace(SUBJECT_MARKER, "").trim().to_string();
    Ok((subject, body.trim()))
}

/// Build the prompt for `query` from `results`, numbering exemplars in input order.
///
/// # Errors
/// [`ReplyError::MalformedExemplar`] if any exemplar lacks the `說明：` delimiter.
pub fn build_prompt(query: &str, results: &[SearchResult]) -> Result<String> {
    let mut lines = Vec::with_capacity(results.len() + 4);
    lines.push(REPLY_INSTRUCTIONS.to_string());
    lines.push(EXEMPLARS_HEADER.to_string());

    for (i, result) in results.iter().enumerate() {
        let n = i + 1;
        let (subject, body) = split_exemplar(&result.q, n)?;
        lines.push(format!(
            "\n【來文{n}】\n{SUBJECT_MARKER}{subject}\n{EXPLANATION_MARKER}{body}\n【回文{n}】\n{}",
            result.a
        ));
    }

    lines.push(QUERY_HEADER.to_string());
    lines.push(query.to_string());
    Ok(lines.join("\n"))
}
