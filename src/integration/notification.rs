// ==========================================
// 样品申请目录系统 - 管理员通知
// ==========================================
// 职责: 渲染“新样品申请”通知并交给邮件通道发送
// 说明: 未配置管理员邮箱时跳过
// ==========================================

use crate::engine::events::{RequestEventSink, RequestSubmittedEvent, SinkError};
use async_trait::async_trait;
use handlebars::Handlebars;
use serde_json::json;
use std::sync::Arc;

const SUBJECT_TEMPLATE: &str = "subject";
const BODY_TEMPLATE: &str = "body";

pub fn get_body_template() -> &'static str {
    include_str!("request_notification.hbs")
}

/// 待发送的邮件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

// ==========================================
// MailTransport Trait - 邮件通道
// ==========================================
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), SinkError>;
}

/// 日志通道：只写 tracing 日志，不真正发信
#[derive(Debug, Clone, Default)]
pub struct LogMailTransport;

#[async_trait]
impl MailTransport for LogMailTransport {
    async fn send(&self, message: MailMessage) -> Result<(), SinkError> {
        tracing::info!(to = %message.to, subject = %message.subject, "通知邮件（日志通道）");
        tracing::debug!(body = %message.body, "通知邮件正文");
        Ok(())
    }
}

// ==========================================
// EmailNotificationSink - 管理员通知投递
// ==========================================
pub struct EmailNotificationSink {
    handlebars: Handlebars<'static>,
    recipient: Option<String>,
    transport: Arc<dyn MailTransport>,
}

impl EmailNotificationSink {
    pub fn new(recipient: Option<String>, transport: Arc<dyn MailTransport>) -> Result<Self, SinkError> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .register_template_string(SUBJECT_TEMPLATE, "New sample request: {{company_name}}")
            .map_err(|e| SinkError::Render(e.to_string()))?;
        handlebars
            .register_template_string(BODY_TEMPLATE, get_body_template())
            .map_err(|e| SinkError::Render(e.to_string()))?;

        Ok(Self {
            handlebars,
            recipient: recipient.filter(|r| !r.trim().is_empty()),
            transport,
        })
    }

    /// 渲染邮件（收件人由调用方指定）
    pub fn render(&self, to: &str, event: &RequestSubmittedEvent) -> Result<MailMessage, SinkError> {
        let lines: Vec<_> = event
            .product_names
            .iter()
            .zip(event.group_names.iter())
            .map(|(product, group)| json!({ "product": product, "group": group }))
            .collect();

        let data = json!({
            "request_id": event.request_id,
            "submitted_at": event.submitted_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            "company_name": event.contact.company_name,
            "full_name": event.contact.full_name(),
            "email": event.contact.email,
            "phone": event.contact.phone,
            "address": event.contact.address.as_deref().unwrap_or("-"),
            "sector_name": event.sector_name,
            "lines": lines,
        });

        let render_err = |e: handlebars::RenderError| SinkError::Render(e.to_string());
        Ok(MailMessage {
            to: to.to_string(),
            subject: self.handlebars.render(SUBJECT_TEMPLATE, &data).map_err(render_err)?,
            body: self.handlebars.render(BODY_TEMPLATE, &data).map_err(render_err)?,
        })
    }
}

#[async_trait]
impl RequestEventSink for EmailNotificationSink {
    fn name(&self) -> &str {
        "admin-notification"
    }

    async fn deliver(&self, event: &RequestSubmittedEvent) -> Result<(), SinkError> {
        let Some(to) = self.recipient.as_deref() else {
            tracing::debug!(request_id = %event.request_id, "未配置管理员邮箱，跳过通知");
            return Ok(());
        };
        let message = self.render(to, event)?;
        self.transport.send(message).await
    }
}
