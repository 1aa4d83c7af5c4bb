//! Application層: ユースケースの編成
//!
//! Domainの型とtraitだけに依存し、セッション制御・検証・分割・分類・
//! 高水準フローを実装する。具体的なエンジンや通知先はInfrastructureから
//! 注入される。

pub mod classifier;
pub mod flows;
pub mod segmentation;
pub mod session;
pub mod validator;
