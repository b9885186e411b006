// 画面描画用のビューモデル
pub mod ledger_view;

pub use ledger_view::{CartRow, CheckoutRequest, LedgerView, PermitRequest, PermitRow};
