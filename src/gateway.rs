use reqwest::Client;
use std::future::Future;
use std::pin::Pin;

use crate::config::Config;
use crate::error::ChatError;
use crate::model::Message;
use crate::providers;

pub type ChatFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ChatError>> + 'a>>;

/// One chat-completion round trip over an ordered message list.
pub trait ChatGateway {
    fn chat<'a>(&'a self, messages: &'a [Message]) -> ChatFuture<'a>;
}

pub struct OpenAiGateway<'a> {
    client: &'a Client,
    cfg: &'a Config,
}

impl<'a> OpenAiGateway<'a> {
    pub fn new(client: &'a Client, cfg: &'a Config) -> Self {
        Self { client, cfg }
    }
}

impl ChatGateway for OpenAiGateway<'_> {
    fn chat<'b>(&'b self, messages: &'b [Message]) -> ChatFuture<'b> {
        Box::pin(providers::openai::chat(self.client, self.cfg, messages))
    }
}
