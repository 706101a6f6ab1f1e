//! Greedy packing of retrieved text into prompt-sized blocks

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::tokens::{count_tokens, split_by_tokens, token_starts};

use super::template::Prompts;

/// Joins node texts inside one block
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Packs texts into blocks of at most `budget` tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextPacker {
    budget: usize,
}

impl ContextPacker {
    /// Packer with an explicit token budget per block
    pub fn new(budget: usize) -> Result<Self> {
        if budget == 0 {
            return Err(Error::Synthesis(
                "prompt leaves no room for context in the context window".to_string(),
            ));
        }
        Ok(Self { budget })
    }

    /// Budget left for context once the prompt and the answer are accounted for
    ///
    /// The prompt overhead is the larger of the two templates rendered with
    /// an empty context and the actual query.
    pub fn for_query(llm: &LlmConfig, prompts: &Prompts, query: &str) -> Result<Self> {
        let qa = count_tokens(&prompts.render_qa("", query)?);
        let refine = count_tokens(&prompts.render_refine(query, "", "")?);
        let overhead = qa.max(refine);

        let budget = llm
            .context_window
            .saturating_sub(llm.num_output)
            .saturating_sub(overhead);
        tracing::debug!(
            "Context budget {} tokens (window {}, output {}, prompt {})",
            budget,
            llm.context_window,
            llm.num_output,
            overhead
        );
        Self::new(budget)
    }

    /// Budget left for context in a refine call that carries `existing_answer`
    pub fn for_refine(
        llm: &LlmConfig,
        prompts: &Prompts,
        query: &str,
        existing_answer: &str,
    ) -> Result<Self> {
        let overhead = count_tokens(&prompts.render_refine(query, existing_answer, "")?);
        let budget = llm
            .context_window
            .saturating_sub(llm.num_output)
            .saturating_sub(overhead);
        Self::new(budget)
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Pack `texts` in order
    ///
    /// Consecutive texts share a block while they fit. A text larger than
    /// the budget is split on token boundaries first. No text is dropped.
    pub fn pack<S: AsRef<str>>(&self, texts: &[S]) -> Vec<String> {
        let mut blocks = Vec::new();
        let mut current = String::new();
        let mut current_tokens = 0usize;

        for text in texts {
            for piece in split_by_tokens(text.as_ref(), self.budget) {
                let tokens = count_tokens(piece);
                if !current.is_empty() && current_tokens + tokens > self.budget {
                    blocks.push(std::mem::take(&mut current));
                    current_tokens = 0;
                }
                if !current.is_empty() {
                    current.push_str(BLOCK_SEPARATOR);
                }
                current.push_str(piece);
                current_tokens += tokens;
            }
        }

        if !current.is_empty() {
            blocks.push(current);
        }
        blocks
    }

    /// Split `text` after its first `budget` tokens
    ///
    /// The rest is empty when the whole text fits.
    pub fn split_first<'a>(&self, text: &'a str) -> (&'a str, &'a str) {
        let starts = token_starts(text);
        if starts.len() <= self.budget {
            (text, "")
        } else {
            text.split_at(starts[self.budget])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(prefix: &str, n: usize) -> String {
        (0..n)
            .map(|i| format!("{}{}", prefix, i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_small_texts_share_a_block() {
        let packer = ContextPacker::new(100).unwrap();
        let blocks = packer.pack(&["alpha beta", "gamma delta"]);
        assert_eq!(blocks, vec!["alpha beta\n\ngamma delta".to_string()]);
    }

    #[test]
    fn test_blocks_respect_budget_and_keep_order() {
        let packer = ContextPacker::new(10).unwrap();
        let texts = [words("a", 6), words("b", 6), words("c", 3)];
        let blocks = packer.pack(&texts);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], texts[0]);
        assert_eq!(blocks[1], format!("{}\n\n{}", texts[1], texts[2]));
        assert!(blocks.iter().all(|b| count_tokens(b) <= 10));
    }

    #[test]
    fn test_oversized_text_is_split() {
        let packer = ContextPacker::new(4).unwrap();
        let text = words("w", 10);
        let blocks = packer.pack(&[text.as_str()]);

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks.concat(), text);
        assert!(blocks.iter().all(|b| count_tokens(b) <= 4));
    }

    #[test]
    fn test_nothing_to_pack() {
        let packer = ContextPacker::new(4).unwrap();
        assert!(packer.pack::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_split_first() {
        let packer = ContextPacker::new(3).unwrap();
        assert_eq!(packer.split_first("a b c d e"), ("a b c ", "d e"));
        assert_eq!(packer.split_first("a b"), ("a b", ""));
    }

    #[test]
    fn test_refine_budget_shrinks_with_answer() {
        let llm = LlmConfig {
            context_window: 400,
            num_output: 50,
            ..LlmConfig::default()
        };
        let prompts = Prompts::default();
        let empty = ContextPacker::for_refine(&llm, &prompts, "q", "").unwrap();
        let answered = ContextPacker::for_refine(&llm, &prompts, "q", &words("x", 40)).unwrap();
        assert_eq!(answered.budget(), empty.budget() - 40);

        assert!(matches!(
            ContextPacker::for_refine(&llm, &prompts, "q", &words("x", 400)),
            Err(Error::Synthesis(_))
        ));
    }

    #[test]
    fn test_budget_from_llm_settings() {
        let llm = LlmConfig {
            context_window: 4096,
            num_output: 256,
            ..LlmConfig::default()
        };
        let prompts = Prompts::default();
        let packer = ContextPacker::for_query(&llm, &prompts, "What is Rust?").unwrap();

        let overhead = count_tokens(&prompts.render_qa("", "What is Rust?").unwrap()).max(
            count_tokens(&prompts.render_refine("What is Rust?", "", "").unwrap()),
        );
        assert_eq!(packer.budget(), 4096 - 256 - overhead);

        let tiny = LlmConfig {
            context_window: 300,
            num_output: 256,
            ..LlmConfig::default()
        };
        assert!(matches!(
            ContextPacker::for_query(&tiny, &prompts, "What is Rust?"),
            Err(Error::Synthesis(_))
        ));
    }
}
