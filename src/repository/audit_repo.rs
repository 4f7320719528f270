// ==========================================
// 纺织品库存台账系统 - 盘点会话仓储
// ==========================================
// 职责: audit_sessions / audit_lines 写入与查询
// 红线: 会话、盘点行、调整流水在同一事务内提交，任一失败整体回滚
// ==========================================

mod core;


pub use core::AuditRepository;
