//! Infrastructure層: 外部接続の実装
//!
//! Domainのportsを具体化する。実機ドライバ未接続の構成では
//! モックエンジンが同じtraitで差し替わる。

pub mod channel_sink;
pub mod encode;
pub mod mock_engine;
