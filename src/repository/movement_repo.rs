// ==========================================
// 纺织品库存台账系统 - 库存流水仓储
// ==========================================
// 职责: movements 表追加写入、冲销/替代、按条件查询
// 红线: 流水只追加；已封存（盘点覆盖）的流水不可冲销或替代
// ==========================================

mod core;
mod queries;


pub use core::MovementRepository;
pub(crate) use core::insert_movement_tx;
pub(crate) use queries::list_movements_with;
