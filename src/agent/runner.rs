//! LLM-driven browsing agent with a tool calling loop.

use super::tools::{parse_tool_call, tool_definitions, BrowserTool, PageFetcher};
use super::{AgentRun, BrowserAgent, Transcript};
use crate::config::{Prompts, Settings};
use crate::error::{GigscoutError, Result};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Characters of a tool result kept in the transcript.
const TRANSCRIPT_RESULT_CHARS: usize = 2_000;

/// Browsing agent that lets an LLM drive page fetches through tools.
pub struct LlmBrowserAgent {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    fetcher: PageFetcher,
    max_steps: usize,
    system_prompt: String,
}

impl LlmBrowserAgent {
    /// Create an agent with the given client, model and page fetcher.
    pub fn new(
        client: async_openai::Client<async_openai::config::OpenAIConfig>,
        model: &str,
        fetcher: PageFetcher,
    ) -> Self {
        Self {
            client,
            model: model.to_string(),
            fetcher,
            max_steps: 30,
            system_prompt: Prompts::default().agent.system,
        }
    }

    /// Build the agent from settings and prompts.
    pub fn from_settings(settings: &Settings, prompts: &Prompts) -> Result<Self> {
        let client = create_client(&settings.llm)?;
        let fetcher = PageFetcher::new(
            &settings.agent.user_agent,
            Duration::from_secs(settings.agent.page_timeout_seconds),
            settings.agent.max_page_chars,
        )?;

        Ok(Self::new(client, &settings.llm.model, fetcher)
            .with_system_prompt(&prompts.agent.system)
            .with_max_steps(settings.agent.max_steps))
    }

    /// Set a custom system prompt.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    /// Set the maximum number of LLM round trips.
    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max.max(1);
        self
    }

    /// Execute one non-final tool call, returning the text fed back to the model.
    async fn execute_tool_call(
        &self,
        tool_call: &ChatCompletionMessageToolCall,
        errors: &mut Vec<String>,
    ) -> (String, String) {
        let name = &tool_call.function.name;
        let arguments = &tool_call.function.arguments;

        info!("Agent calling tool: {} with args: {}", name, arguments);

        match parse_tool_call(name, arguments) {
            Ok(tool) => {
                let action = tool.to_string();
                match self.fetcher.execute(&tool).await {
                    Ok(output) => (action, output),
                    Err(e) => {
                        warn!("Tool {} failed: {}", action, e);
                        errors.push(e.to_string());
                        (action, format!("Tool error: {}", e))
                    }
                }
            }
            Err(e) => {
                errors.push(e.to_string());
                (format!("{}({})", name, arguments), format!("Failed to parse tool call: {}", e))
            }
        }
    }
}

#[async_trait]
impl BrowserAgent for LlmBrowserAgent {
    async fn run(&self, task: &str, transcript: &Transcript) -> Result<AgentRun> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.system_prompt.clone())
                .build()
                .map_err(|e| GigscoutError::Agent(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(task.to_string())
                .build()
                .map_err(|e| GigscoutError::Agent(e.to_string()))?
                .into(),
        ];

        let mut errors = Vec::new();

        for step in 1..=self.max_steps {
            debug!("Agent step {}", step);

            let request = CreateChatCompletionRequestArgs::default()
                .model(&self.model)
                .messages(messages.clone())
                .tools(tool_definitions())
                .build()
                .map_err(|e| GigscoutError::Agent(e.to_string()))?;

            let response = self
                .client
                .chat()
                .create(request)
                .await
                .map_err(|e| GigscoutError::Llm(e.to_string()))?;

            let choice = response
                .choices
                .first()
                .ok_or_else(|| GigscoutError::Agent("No response from model".to_string()))?;

            let tool_calls = match &choice.message.tool_calls {
                Some(calls) if !calls.is_empty() => calls.clone(),
                _ => {
                    // No tool call: the plain reply is the final answer.
                    let content = choice.message.content.clone().unwrap_or_default();
                    transcript.record(step, "reply", truncate(&content));
                    let successful = !content.trim().is_empty();
                    return Ok(AgentRun {
                        final_output: Some(content),
                        is_done: true,
                        is_successful: successful,
                        errors,
                    });
                }
            };

            let assistant_msg = ChatCompletionRequestAssistantMessageArgs::default()
                .tool_calls(tool_calls.clone())
                .build()
                .map_err(|e| GigscoutError::Agent(e.to_string()))?;
            messages.push(assistant_msg.into());

            for tool_call in &tool_calls {
                if tool_call.function.name == "done" {
                    if let Ok(BrowserTool::Done { result, success }) =
                        parse_tool_call(&tool_call.function.name, &tool_call.function.arguments)
                    {
                        transcript.record(step, format!("done(success={})", success), truncate(&result));
                        return Ok(AgentRun {
                            final_output: Some(result),
                            is_done: true,
                            is_successful: success,
                            errors,
                        });
                    }
                }

                let (action, result) = self.execute_tool_call(tool_call, &mut errors).await;
                transcript.record(step, action, truncate(&result));

                let tool_msg = ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(&tool_call.id)
                    .content(result)
                    .build()
                    .map_err(|e| GigscoutError::Agent(e.to_string()))?;
                messages.push(tool_msg.into());
            }
        }

        warn!("Agent reached the step limit ({})", self.max_steps);
        errors.push(format!("step limit of {} reached", self.max_steps));
        Ok(AgentRun {
            final_output: None,
            is_done: false,
            is_successful: false,
            errors,
        })
    }
}

fn truncate(s: &str) -> String {
    match s.char_indices().nth(TRANSCRIPT_RESULT_CHARS) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
