//! Compact-refine response synthesis

use std::sync::Arc;

use crate::config::{LlmConfig, RagConfig};
use crate::error::{Error, Result};
use crate::providers::{LlmProvider, RetryPolicy};
use crate::types::{NodeWithScore, QueryResponse};

use super::packer::ContextPacker;
use super::template::Prompts;
use super::ResponseMode;

/// Progress of one synthesis run; moves forward only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisState {
    NotStarted,
    AnsweringInitialBlock,
    RefiningWithBlock(usize),
    Done,
}

impl SynthesisState {
    /// State after the current step, given the number of context blocks
    pub fn next(self, total_blocks: usize) -> Self {
        match self {
            Self::NotStarted => Self::AnsweringInitialBlock,
            Self::AnsweringInitialBlock if total_blocks > 1 => Self::RefiningWithBlock(1),
            Self::RefiningWithBlock(i) if i + 1 < total_blocks => Self::RefiningWithBlock(i + 1),
            Self::AnsweringInitialBlock | Self::RefiningWithBlock(_) | Self::Done => Self::Done,
        }
    }

    /// Block consumed by this state, if any
    pub fn block_index(self) -> Option<usize> {
        match self {
            Self::AnsweringInitialBlock => Some(0),
            Self::RefiningWithBlock(i) => Some(i),
            Self::NotStarted | Self::Done => None,
        }
    }
}

/// Turns retrieved nodes into an answer through the language model
pub struct ResponseSynthesizer {
    llm: Arc<dyn LlmProvider>,
    prompts: Prompts,
    llm_config: LlmConfig,
    retry: RetryPolicy,
    mode: ResponseMode,
}

impl ResponseSynthesizer {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        prompts: Prompts,
        llm_config: LlmConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            llm,
            prompts,
            llm_config,
            retry,
            mode: ResponseMode::Compact,
        }
    }

    /// Build from config, loading custom templates when configured
    pub fn from_config(config: &RagConfig, llm: Arc<dyn LlmProvider>) -> Result<Self> {
        let prompts = Prompts::from_config(&config.prompt)?;
        Ok(Self::new(
            llm,
            prompts,
            config.llm.clone(),
            RetryPolicy::from_config(&config.retry),
        )
        .with_mode(config.retrieval.response_mode))
    }

    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    /// Answer `query` from `nodes` (most similar first)
    ///
    /// The first context block is answered with the QA template, every
    /// following block refines the current answer. With no nodes a single
    /// QA call is made on an empty context.
    pub async fn synthesize(&self, query: &str, nodes: Vec<NodeWithScore>) -> Result<QueryResponse> {
        let blocks = match self.mode {
            ResponseMode::Compact => {
                let packer = ContextPacker::for_query(&self.llm_config, &self.prompts, query)?;
                let texts: Vec<&str> = nodes.iter().map(|n| n.text.as_str()).collect();
                packer.pack(&texts)
            }
        };
        let blocks = if blocks.is_empty() {
            vec![String::new()]
        } else {
            blocks
        };

        tracing::debug!(
            "Synthesizing from {} nodes in {} context block(s)",
            nodes.len(),
            blocks.len()
        );

        let mut answer = String::new();
        let mut llm_calls = 0usize;
        let mut state = SynthesisState::NotStarted.next(blocks.len());

        while let Some(i) = state.block_index() {
            if state == SynthesisState::AnsweringInitialBlock {
                let prompt = self.prompts.render_qa(&blocks[i], query)?;
                answer = self.complete(&prompt, i, blocks.len()).await?;
                llm_calls += 1;
            } else {
                // The budget depends on the current answer, so a block that no
                // longer fits is refined in several consecutive calls.
                let mut rest = blocks[i].as_str();
                loop {
                    let packer =
                        ContextPacker::for_refine(&self.llm_config, &self.prompts, query, &answer)?;
                    let (piece, tail) = packer.split_first(rest);
                    let prompt = self.prompts.render_refine(query, &answer, piece)?;
                    answer = self.complete(&prompt, i, blocks.len()).await?;
                    llm_calls += 1;
                    if tail.is_empty() {
                        break;
                    }
                    rest = tail;
                }
            }
            state = state.next(blocks.len());
        }

        Ok(QueryResponse {
            response: answer,
            source_nodes: nodes,
            llm_calls,
        })
    }

    async fn complete(&self, prompt: &str, block: usize, total: usize) -> Result<String> {
        let label = format!("completion for block {}/{}", block + 1, total);
        self.retry
            .run(&label, || self.llm.complete(prompt))
            .await
            .map_err(|e| {
                Error::Synthesis(format!(
                    "{} ({}) failed on block {}/{}: {}",
                    self.llm.name(),
                    self.llm.model(),
                    block + 1,
                    total,
                    e
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::PromptTemplate;
    use crate::tokens::count_tokens;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records prompts and replies from a script
    struct ScriptedLlm {
        prompts: Mutex<Vec<String>>,
        replies: Mutex<VecDeque<Result<String>>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
                replies: Mutex::new(replies.into()),
            })
        }

        fn answering(n: usize) -> Arc<Self> {
            Self::new((0..n).map(|i| Ok(format!("answer-{}", i))).collect())
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::llm("script exhausted")))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "test"
        }
    }

    fn node(text: &str) -> NodeWithScore {
        NodeWithScore {
            node_id: text.to_string(),
            text: text.to_string(),
            metadata: Default::default(),
            score: 1.0,
        }
    }

    /// Tokens in a scripted "answer-N" reply
    const ANSWER_TOKENS: usize = 3;

    /// Room for `context` tokens of context per call next to a scripted answer
    fn synthesizer(llm: Arc<ScriptedLlm>, context: usize, retry: RetryPolicy) -> ResponseSynthesizer {
        let prompts = Prompts::default();
        let overhead = count_tokens(&prompts.render_refine("q", "", "").unwrap())
            .max(count_tokens(&prompts.render_qa("", "q").unwrap()));
        let llm_config = LlmConfig {
            context_window: overhead + 10 + context + ANSWER_TOKENS,
            num_output: 10,
            ..LlmConfig::default()
        };
        ResponseSynthesizer::new(llm, prompts, llm_config, retry)
    }

    fn words(prefix: &str, n: usize) -> String {
        (0..n).map(|i| format!("{}{} ", prefix, i)).collect()
    }

    #[test]
    fn test_state_machine() {
        let mut state = SynthesisState::NotStarted;
        let mut seen = Vec::new();
        while state != SynthesisState::Done {
            state = state.next(3);
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                SynthesisState::AnsweringInitialBlock,
                SynthesisState::RefiningWithBlock(1),
                SynthesisState::RefiningWithBlock(2),
                SynthesisState::Done,
            ]
        );
        assert_eq!(SynthesisState::AnsweringInitialBlock.next(1), SynthesisState::Done);
        assert_eq!(SynthesisState::Done.next(5), SynthesisState::Done);
    }

    #[tokio::test]
    async fn test_single_block_is_one_qa_call() {
        let llm = ScriptedLlm::answering(1);
        let synth = synthesizer(llm.clone(), 100, RetryPolicy::none());

        let response = synth
            .synthesize("q", vec![node("alpha"), node("beta")])
            .await
            .unwrap();

        assert_eq!(response.response, "answer-0");
        assert_eq!(response.llm_calls, 1);
        assert_eq!(response.source_nodes.len(), 2);
        assert!(llm.prompts()[0].contains("alpha\n\nbeta"));
    }

    #[tokio::test]
    async fn test_one_answer_then_refines_in_order() {
        let llm = ScriptedLlm::answering(3);
        let synth = synthesizer(llm.clone(), 8, RetryPolicy::none());
        let nodes = vec![node(&words("a", 8)), node(&words("b", 8)), node(&words("c", 8))];

        let response = synth.synthesize("q", nodes).await.unwrap();
        let prompts = llm.prompts();

        assert_eq!(response.llm_calls, 3);
        assert_eq!(response.response, "answer-2");
        assert!(prompts[0].starts_with("Context information is below."));
        assert!(prompts[0].contains("a0 "));
        assert!(prompts[1].contains("existing answer: answer-0"));
        assert!(prompts[1].contains("b0 "));
        assert!(prompts[2].contains("existing answer: answer-1"));
        assert!(prompts[2].contains("c0 "));
    }

    #[tokio::test]
    async fn test_prompts_stay_within_context_window() {
        let long_answer = words("r", 30);
        let llm = ScriptedLlm::new((0..20).map(|_| Ok(long_answer.clone())).collect());
        let llm_config = LlmConfig {
            context_window: 200,
            num_output: 40,
            ..LlmConfig::default()
        };
        let synth =
            ResponseSynthesizer::new(llm.clone(), Prompts::default(), llm_config, RetryPolicy::none());
        let nodes = vec![node(&words("a", 100)), node(&words("b", 100))];

        let response = synth.synthesize("q", nodes).await.unwrap();
        let prompts = llm.prompts();

        assert_eq!(response.llm_calls, prompts.len());
        assert!(prompts.len() >= 4);
        for prompt in &prompts {
            assert!(count_tokens(prompt) <= 160, "{} tokens", count_tokens(prompt));
        }
        let seen = prompts.concat();
        for word in ["a0 ", "a99 ", "b0 ", "b99 "] {
            assert!(seen.contains(word), "{} never sent", word);
        }
    }

    #[tokio::test]
    async fn test_no_nodes_is_one_call_with_empty_context() {
        let llm = ScriptedLlm::answering(1);
        let synth = synthesizer(llm.clone(), 50, RetryPolicy::none());

        let response = synth.synthesize("q", Vec::new()).await.unwrap();
        assert_eq!(response.llm_calls, 1);
        assert!(llm.prompts()[0].contains("---------------------\n\n---------------------"));
    }

    #[tokio::test]
    async fn test_transient_failure_retried_then_succeeds() {
        let llm = ScriptedLlm::new(vec![Err(Error::transient("reset")), Ok("ok".to_string())]);
        let retry = RetryPolicy::new(2, Duration::ZERO, Duration::ZERO);
        let synth = synthesizer(llm.clone(), 50, retry);

        let response = synth.synthesize("q", vec![node("x")]).await.unwrap();
        assert_eq!(response.response, "ok");
        assert_eq!(response.llm_calls, 1);
        assert_eq!(llm.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_with_synthesis() {
        let llm = ScriptedLlm::new(vec![
            Err(Error::transient("reset")),
            Err(Error::transient("reset")),
        ]);
        let retry = RetryPolicy::new(1, Duration::ZERO, Duration::ZERO);
        let synth = synthesizer(llm, 50, retry);

        let result = synth.synthesize("q", vec![node("x")]).await;
        assert!(matches!(result, Err(Error::Synthesis(_))));
    }

    #[tokio::test]
    async fn test_unbound_placeholder_fails_before_any_call() {
        let llm = ScriptedLlm::answering(1);
        let mut prompts = Prompts::default();
        // A question-answer call never binds the existing answer
        prompts.qa = PromptTemplate::new(
            "{existing_answer}: {context_str} {query_str}",
            &["existing_answer", "context_str", "query_str"],
        )
        .unwrap();
        let synth = ResponseSynthesizer::new(
            llm.clone(),
            prompts,
            LlmConfig::default(),
            RetryPolicy::none(),
        );

        let result = synth.synthesize("q", vec![node("x")]).await;
        assert!(matches!(result, Err(Error::Template(_))));
        assert!(llm.prompts().is_empty());
    }
}
