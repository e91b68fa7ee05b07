// MIT License - Copyright (c) 2026 Peter Wright

//! Thin publish/subscribe seam over the MQTT client.
//!
//! Device logic talks to this trait instead of `rumqttc::AsyncClient`
//! directly so that state-synchronization behavior (publish suppression,
//! ordering, retain flags) can be observed in tests.

use std::future::Future;
use std::sync::Arc;

use rumqttc::{AsyncClient, QoS};

use crate::error::Result;

pub trait MqttPublish: Send + Sync + 'static {
    /// Publish a UTF-8 payload at QoS 1.
    fn publish(
        &self,
        topic: &str,
        payload: &str,
        retain: bool,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Subscribe to a topic at QoS 1.
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<()>> + Send;
}

impl MqttPublish for AsyncClient {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        AsyncClient::publish(self, topic, QoS::AtLeastOnce, retain, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<()> {
        AsyncClient::subscribe(self, topic, QoS::AtLeastOnce).await?;
        Ok(())
    }
}

impl<P: MqttPublish> MqttPublish for Arc<P> {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        P::publish(self, topic, payload, retain).await
    }

    async fn subscribe(&self, topic: &str) -> Result<()> {
        P::subscribe(self, topic).await
    }
}
