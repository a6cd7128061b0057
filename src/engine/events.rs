// ==========================================
// 样品申请目录系统 - 申请提交事件分发
// ==========================================
// 职责: 定义“申请已提交”事件与外部投递 trait（表格追加 / 管理员通知）
// 红线: 投递在独立任务中执行；失败只记日志，不影响提交结果
// ==========================================

use crate::domain::request::{ContactInfo, SampleRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

// ==========================================
// RequestSubmittedEvent - 申请已提交事件
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSubmittedEvent {
    pub request_id: String,
    pub submitted_at: DateTime<Utc>,
    pub contact: ContactInfo,
    /// 行业名称（未选择行业时为“其他”标签）
    pub sector_name: String,
    pub group_names: Vec<String>,
    pub product_names: Vec<String>,
}

impl RequestSubmittedEvent {
    pub fn from_request(request: &SampleRequest, sector_name: impl Into<String>) -> Self {
        Self {
            request_id: request.request_id.clone(),
            submitted_at: request.created_at,
            contact: request.contact.clone(),
            sector_name: sector_name.into(),
            group_names: request.group_names(),
            product_names: request.product_names(),
        }
    }
}

// ==========================================
// 投递 Trait
// ==========================================

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("渲染失败: {0}")]
    Render(String),

    #[error("写入失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("投递失败: {0}")]
    Delivery(String),
}

/// 申请事件投递目标
#[async_trait]
pub trait RequestEventSink: Send + Sync {
    /// 日志中使用的名称
    fn name(&self) -> &str;

    async fn deliver(&self, event: &RequestSubmittedEvent) -> Result<(), SinkError>;
}

// ==========================================
// SideEffectDispatcher - 分离式投递
// ==========================================
#[derive(Clone, Default)]
pub struct SideEffectDispatcher {
    sinks: Vec<Arc<dyn RequestEventSink>>,
}

impl SideEffectDispatcher {
    pub fn new(sinks: Vec<Arc<dyn RequestEventSink>>) -> Self {
        Self { sinks }
    }

    /// 每个投递目标一个独立任务；调用方无需等待
    ///
    /// 必须在 tokio 运行时内调用
    pub fn dispatch(&self, event: RequestSubmittedEvent) -> DispatchHandle {
        let event = Arc::new(event);
        let handles = self
            .sinks
            .iter()
            .cloned()
            .map(|sink| {
                let event = Arc::clone(&event);
                tokio::spawn(async move {
                    match sink.deliver(&event).await {
                        Ok(()) => {
                            tracing::info!(sink = sink.name(), request_id = %event.request_id, "事件投递成功");
                            true
                        }
                        Err(e) => {
                            tracing::warn!(
                                sink = sink.name(),
                                request_id = %event.request_id,
                                error = %e,
                                "事件投递失败（不影响申请提交）"
                            );
                            false
                        }
                    }
                })
            })
            .collect();

        DispatchHandle { handles }
    }
}

/// 投递汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub failed: usize,
}

/// 已分发任务的句柄；丢弃即分离
#[derive(Debug)]
pub struct DispatchHandle {
    handles: Vec<JoinHandle<bool>>,
}

impl DispatchHandle {
    /// 等待全部投递结束（测试 / CLI 退出前使用）
    pub async fn wait(self) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        for result in join_all(self.handles).await {
            match result {
                Ok(true) => summary.delivered += 1,
                Ok(false) => summary.failed += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "投递任务异常退出");
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}
