//! Inbound completion request shape, as seen by the router.
//!
//! Only the parts that influence routing are modelled: the optional explicit
//! model, messages (text, images, tool calls), tools, streaming, response
//! format and the output token budget.

use serde::{Deserialize, Serialize};

use crate::registry::Capability;

/// Completion request handed to the router (OpenAI-compatible subset).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RoutingRequest {
    /// Explicit model id; bypasses strategy selection when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A chat message.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub role: String,
    pub content: MessageContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Message content is either a plain string or a list of typed parts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A single typed content part.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: ImageUrl,
    },
    ToolCall {
        id: String,
        name: String,
        #[serde(default)]
        arguments: serde_json::Value,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Tool offered to the model for function calling.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type", default = "default_tool_type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

fn default_tool_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Requested response format.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
    JsonSchema { json_schema: serde_json::Value },
}

impl ResponseFormat {
    pub fn is_json(&self) -> bool {
        match self {
            ResponseFormat::Text => false,
            ResponseFormat::JsonObject | ResponseFormat::JsonSchema { .. } => true,
        }
    }
}

impl Message {
    pub fn new(role: impl Into<String>, content: MessageContent) -> Self {
        Self {
            role: role.into(),
            content,
            name: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new("user", MessageContent::Text(text.into()))
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new("system", MessageContent::Text(text.into()))
    }

    pub fn parts(role: impl Into<String>, parts: Vec<ContentPart>) -> Self {
        Self::new(role, MessageContent::Parts(parts))
    }

    pub fn has_image(&self) -> bool {
        self.image_count() > 0
    }

    pub fn image_count(&self) -> usize {
        match &self.content {
            MessageContent::Text(_) => 0,
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|part| match part {
                    ContentPart::ImageUrl { .. } => true,
                    ContentPart::Text { .. } | ContentPart::ToolCall { .. } => false,
                })
                .count(),
        }
    }

    /// Characters of text carried by this message, tool call arguments included.
    pub fn text_len(&self) -> usize {
        match &self.content {
            MessageContent::Text(text) => text.len(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => text.len(),
                    ContentPart::ImageUrl { .. } => 0,
                    ContentPart::ToolCall {
                        name, arguments, ..
                    } => name.len() + arguments.to_string().len(),
                })
                .sum(),
        }
    }
}

impl RoutingRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// Capabilities implied by the shape of the request.
    ///
    /// Always includes `chat`. Adds `function_calling` for tools, `streaming`
    /// when requested, `json_mode` for a JSON response format and
    /// `image_analysis` when any message carries an image part.
    pub fn inferred_capabilities(&self) -> Vec<Capability> {
        let mut caps = vec![Capability::Chat];
        if !self.tools.is_empty() {
            caps.push(Capability::FunctionCalling);
        }
        if self.is_streaming() {
            caps.push(Capability::Streaming);
        }
        if self
            .response_format
            .as_ref()
            .is_some_and(ResponseFormat::is_json)
        {
            caps.push(Capability::JsonMode);
        }
        if self.messages.iter().any(Message::has_image) {
            caps.push(Capability::ImageAnalysis);
        }
        caps
    }
}

impl ToolDefinition {
    pub fn function(name: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            kind: default_tool_type(),
            function: FunctionDefinition {
                name: name.into(),
                description: None,
                parameters,
            },
        }
    }
}
