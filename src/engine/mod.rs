// ==========================================
// 样品申请目录系统 - 引擎层
// ==========================================
// 职责: 实现业务规则（依赖守卫 / 申请校验与快照 / 事件分发）,不拼 SQL
// 红线: 拒绝类结果必须输出原因
// ==========================================

pub mod dependency_guard;
pub mod events;
pub mod request_validator;

// 重导出核心引擎
pub use dependency_guard::{DeleteCheck, DependencyGuard, GuardedDelete};
pub use events::{
    DispatchHandle, DispatchSummary, RequestEventSink, RequestSubmittedEvent,
    SideEffectDispatcher, SinkError,
};
pub use request_validator::{
    RequestValidationError, RequestValidator, SubmissionOutcome, SubmitRequestInput,
    ValidatedRequest,
};
