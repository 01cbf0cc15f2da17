use std::collections::HashMap;
use std::sync::Arc;

use super::{
    parse_tool_arguments, Capability, CapabilityArgs, CapabilityHandler, CapabilityOutput,
    ImageHandler, PromptHandler,
};
use crate::chat::{ChatProvider, Tool};
use crate::error::{DispatchError, LLMError};
use crate::image::ImageProvider;
use crate::ToolCall;

/// Dispatch table mapping each capability to its handler.
#[derive(Default, Clone)]
pub struct CapabilityRegistry {
    handlers: HashMap<Capability, Arc<dyn CapabilityHandler>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for every tool capability.
    ///
    /// Text capabilities share `chat`; image generation uses `image`.
    pub fn with_defaults(chat: Arc<dyn ChatProvider>, image: Arc<dyn ImageProvider>) -> Self {
        let mut registry = Self::new();
        for capability in Capability::tools() {
            let handler: Arc<dyn CapabilityHandler> = match capability {
                Capability::ImageGenerate => Arc::new(ImageHandler::new(image.clone())),
                other => Arc::new(PromptHandler::new(other, chat.clone())),
            };
            registry.register(handler);
        }
        registry
    }

    /// Adds or replaces the handler for its capability.
    pub fn register(
        &mut self,
        handler: Arc<dyn CapabilityHandler>,
    ) -> Option<Arc<dyn CapabilityHandler>> {
        self.handlers.insert(handler.capability(), handler)
    }

    pub fn get(&self, capability: Capability) -> Option<&Arc<dyn CapabilityHandler>> {
        self.handlers.get(&capability)
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.handlers.contains_key(&capability)
    }

    /// Registered capabilities in declaration order.
    pub fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.contains(*c))
            .collect()
    }

    /// Tool declarations for the registered capabilities.
    pub fn tools(&self) -> Vec<Tool> {
        self.capabilities()
            .into_iter()
            .filter_map(Capability::tool)
            .collect()
    }

    /// Invokes the handler for `capability`.
    pub async fn invoke(
        &self,
        capability: Capability,
        args: &CapabilityArgs,
    ) -> Result<CapabilityOutput, DispatchError> {
        let handler = self.get(capability).ok_or_else(|| {
            DispatchError::capability(
                capability.name(),
                LLMError::ToolConfigError(format!("No handler registered for {capability}")),
            )
        })?;

        log::debug!("invoking capability {capability}");
        handler
            .invoke(args)
            .await
            .map_err(|e| DispatchError::capability(capability.name(), e))
    }

    /// Resolves a model tool call to its capability and invokes it.
    pub async fn invoke_tool_call(
        &self,
        call: &ToolCall,
    ) -> Result<(Capability, CapabilityOutput), DispatchError> {
        let name = call.function.name.as_str();
        let capability = Capability::from_tool_name(name).ok_or_else(|| {
            DispatchError::capability(
                name,
                LLMError::ToolConfigError(format!("Unknown tool: {name}")),
            )
        })?;

        let args = parse_tool_arguments(&call.function.arguments)
            .map_err(|e| DispatchError::capability(capability.name(), e))?;
        let output = self.invoke(capability, &args).await?;
        Ok((capability, output))
    }
}
