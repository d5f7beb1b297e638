//! The enhancement step: extracted slides in, raw model reply out.

use crate::client::{ChatCompletion, ChatMessage, ChatRequest};
use crate::prompt::{user_prompt, SYSTEM_PROMPT};
use deck_core::{ExtractedDeck, GenerationParameters, Result};

/// Asks a language model to restructure an extracted deck.
pub struct Enhancer<C> {
    client: C,
}

impl<C: ChatCompletion> Enhancer<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// The request [`Enhancer::enhance`] would send.
    pub fn request(&self, params: &GenerationParameters, deck: &ExtractedDeck) -> Result<ChatRequest> {
        Ok(ChatRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user_prompt(params, deck)?),
        ]))
    }

    /// Send one request and return the reply text, trimmed.
    ///
    /// The reply is expected, not guaranteed, to be JSON; parsing is left to
    /// the caller. Service errors propagate unchanged and are not retried.
    pub fn enhance(&self, params: &GenerationParameters, deck: &ExtractedDeck) -> Result<String> {
        let request = self.request(params, deck)?;
        log::info!(
            "Requesting {} slides on {:?} from {}",
            params.target_slide_count,
            params.topic,
            request.model
        );

        let reply = self.client.complete(&request)?;
        log::debug!("Model replied with {} bytes", reply.len());

        Ok(reply.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Role;
    use deck_core::{Error, SlideRecord};
    use std::cell::RefCell;

    /// Records every request and answers with a fixed reply.
    struct Scripted {
        reply: Result<String>,
        seen: RefCell<Vec<ChatRequest>>,
    }

    impl Scripted {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                seen: RefCell::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(Error::ServiceFailure("rate limited".to_string())),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl ChatCompletion for Scripted {
        fn complete(&self, request: &ChatRequest) -> Result<String> {
            self.seen.borrow_mut().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(Error::ServiceFailure(e.to_string())),
            }
        }
    }

    fn deck() -> ExtractedDeck {
        let mut deck = ExtractedDeck::new();
        deck.push(SlideRecord::new("Intro"));
        deck
    }

    #[test]
    fn test_sends_one_request_with_fixed_settings() {
        let enhancer = Enhancer::new(Scripted::replying("{}"));
        let params = GenerationParameters::default();
        enhancer.enhance(&params, &deck()).unwrap();

        let seen = enhancer.client.seen.borrow();
        assert_eq!(seen.len(), 1);
        let request = &seen[0];
        assert_eq!(request.model, "gpt-4");
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.max_tokens, 1200);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, SYSTEM_PROMPT);
        assert_eq!(request.messages[1].role, Role::User);
        assert!(request.messages[1].content.contains("Topic: AI in Healthcare"));
        assert!(request.messages[1].content.contains("~6"));
        assert!(request.messages[1].content.contains("Professional, modern, minimal"));
    }

    #[test]
    fn test_reply_is_trimmed_not_parsed() {
        let enhancer = Enhancer::new(Scripted::replying("\n  not json at all \n"));
        let reply = enhancer.enhance(&GenerationParameters::default(), &deck()).unwrap();
        assert_eq!(reply, "not json at all");
    }

    #[test]
    fn test_service_failure_propagates() {
        let enhancer = Enhancer::new(Scripted::failing());
        let err = enhancer
            .enhance(&GenerationParameters::default(), &deck())
            .unwrap_err();
        assert!(matches!(err, Error::ServiceFailure(_)));
        assert_eq!(enhancer.client.seen.borrow().len(), 1);
    }
}
