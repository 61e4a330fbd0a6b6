//! Control topic layout: `<namespace>/<channel-name>/control`.
use crate::config::{MqttConfig, PayloadConfig};
use crate::consts;
use crate::dispatcher::{unknown_payload, Command, InboundAdapter, StateTokens};
use crate::error::DispatchError;
use crate::frame::{Channel, DesiredState};

use super::Incoming;

#[derive(Clone, Debug)]
pub struct TopicLayout {
    namespace: String,
    /// Index 0 is channel 1.
    names: Vec<String>,
    tokens: StateTokens,
}

impl TopicLayout {
    pub fn new(mqtt: &MqttConfig, payload: &PayloadConfig) -> Self {
        Self {
            namespace: mqtt.namespace.trim_end_matches('/').to_string(),
            names: mqtt.channel_names(),
            tokens: StateTokens::new(payload),
        }
    }

    pub fn control_topic(&self, channel: Channel) -> String {
        format!(
            "{}/{}/{}",
            self.namespace,
            self.names[(channel.index() - 1) as usize],
            consts::CONTROL_SUFFIX
        )
    }

    /// Topics to subscribe to, in channel order.
    pub fn control_topics(&self) -> Vec<String> {
        Channel::ALL
            .into_iter()
            .map(|channel| self.control_topic(channel))
            .collect()
    }

    pub fn channel_for(&self, topic: &str) -> Option<Channel> {
        let name = topic
            .strip_prefix(self.namespace.as_str())?
            .strip_prefix('/')?
            .strip_suffix(consts::CONTROL_SUFFIX)?
            .strip_suffix('/')?;
        let pos = self.names.iter().position(|n| n == name)?;
        Channel::new(pos as u8 + 1).ok()
    }

    /// Topic and payload that switch `channel` to `state`.
    pub fn command_for(&self, channel: Channel, state: DesiredState) -> (String, String) {
        (
            self.control_topic(channel),
            self.tokens.token_for(state).to_string(),
        )
    }
}

impl InboundAdapter for TopicLayout {
    type Event = Incoming;

    fn resolve(&self, event: &Incoming) -> Result<Command, DispatchError> {
        let Incoming::Control { topic, payload } = event;
        let channel = self
            .channel_for(topic)
            .ok_or_else(|| DispatchError::UnknownChannel(topic.clone()))?;
        let state = match std::str::from_utf8(payload) {
            Ok(text) => self.tokens.resolve(channel, text)?,
            Err(_) => unknown_payload(
                self.tokens.unknown_policy(),
                channel,
                &String::from_utf8_lossy(payload),
            )?,
        };
        Ok(Command { channel, state })
    }
}
