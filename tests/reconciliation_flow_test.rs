// ==========================================
// 盘点对账 集成测试
// ==========================================
// 测试范围:
// 1. 差异计算与调整流水拆分
// 2. 不完整录入整单拒绝、不留任何数据
// 3. 零差异行策略（SKIP / RECORD）
// 4. 提交原子性（故障注入）
// 5. 账面复核（REVALIDATE）
// 6. 盘点后的流水封存
// ==========================================


use rust_decimal_macros::dec;
use test_helpers::*;
use textile_stock::api::{ApiError, MovementQuery};
use textile_stock::config::config_keys;
use textile_stock::domain::{Balance, CountEntry, MovementPatch};
use textile_stock::MovementKind;

// ==========================================
// 差异计算
// ==========================================

#[test]
fn test_commit_diff_arithmetic_and_split() {
    let env = TestEnv::new().unwrap();
    let item = env.create_item("رسمة 1", "7");
    env.purchase(&item, date(2026, 3, 1), dec!(10.000), 5);

    let api = &env.state.reconciliation_api;
    let snapshot = api.load_sheet(true).unwrap();
    assert_eq!(
        snapshot.get(&item.item_id).unwrap().book,
        Balance::new(dec!(10.000), 5)
    );

    let entries = vec![CountEntry::new(&item.item_id, Some(dec!(12.500)), Some(dec!(3)))];
    let result = api
        .commit(date(2026, 3, 31), Some("جرد مارس"), &entries, &snapshot)
        .unwrap();
    assert_eq!(result.outcome.applied_count, 1);
    assert_eq!(result.outcome.recorded_lines, 1);
    assert!(!result.message.is_empty());

    // 调整流水：主数量入 2.5，卷数出 2
    let adjustments = env
        .state
        .movement_api
        .list(&MovementQuery {
            kind: Some(MovementKind::Adjustment),
            ..MovementQuery::default()
        })
        .unwrap();
    assert_eq!(adjustments.len(), 1);
    let adj = &adjustments[0].movement;
    assert_eq!(adj.qty_main_in, dec!(2.5));
    assert_eq!(adj.qty_main_out, dec!(0));
    assert_eq!(adj.qty_rolls_in, 0);
    assert_eq!(adj.qty_rolls_out, 2);
    assert_eq!(adj.move_date, date(2026, 3, 31));
    assert_eq!(adj.session_id.as_deref(), Some(result.outcome.session_id.as_str()));

    // 调整后余额 = 实盘
    let balances = env.state.stock_api.current_balances().unwrap();
    assert_eq!(balances[&item.item_id], Balance::new(dec!(12.5), 3));

    let detail = api.session_detail(&result.outcome.session_id).unwrap();
    assert_eq!(detail.session.note.as_deref(), Some("جرد مارس"));
    assert_eq!(detail.lines.len(), 1);
    assert_eq!(detail.lines[0].line.diff_main, dec!(2.5));
    assert_eq!(detail.lines[0].line.diff_rolls, -2);
    assert_eq!(detail.lines[0].color_code.as_deref(), Some("7"));
}

#[test]
fn test_partial_entry_rejects_whole_commit() {
    let env = TestEnv::new().unwrap();
    let a = env.create_item("رسمة 1", "1");
    let b = env.create_item("رسمة 2", "1");
    env.purchase(&a, date(2026, 3, 1), dec!(10.000), 5);
    env.purchase(&b, date(2026, 3, 1), dec!(4), 2);

    let api = &env.state.reconciliation_api;
    let snapshot = api.load_sheet(true).unwrap();
    let entries = vec![
        // 有效行
        CountEntry::new(&b.item_id, Some(dec!(3)), Some(dec!(2))),
        // 只填了主数量
        CountEntry::new(&a.item_id, Some(dec!(10.000)), None),
    ];

    let err = api
        .commit(date(2026, 3, 31), None, &entries, &snapshot)
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)), "{:?}", err);

    assert!(api.list_sessions(None, None).unwrap().is_empty());
    let conn = env.raw_conn();
    assert_eq!(count_rows(&conn, "audit_sessions"), 0);
    assert_eq!(count_rows(&conn, "audit_lines"), 0);
    assert_eq!(count_rows(&conn, "movements"), 2);
}

#[test]
fn test_unchanged_item_is_skipped_while_others_apply() {
    let env = TestEnv::new().unwrap();
    let same = env.create_item("رسمة 1", "1");
    let diff = env.create_item("رسمة 1", "2");
    env.purchase(&same, date(2026, 3, 1), dec!(8), 4);
    env.purchase(&diff, date(2026, 3, 1), dec!(8), 4);

    let api = &env.state.reconciliation_api;
    let snapshot = api.load_sheet(true).unwrap();
    let entries = vec![
        CountEntry::new(&same.item_id, Some(dec!(8.000)), Some(dec!(4))),
        CountEntry::new(&diff.item_id, Some(dec!(7)), Some(dec!(4))),
    ];
    let result = api
        .commit(date(2026, 3, 31), None, &entries, &snapshot)
        .unwrap();
    assert_eq!(result.outcome.applied_count, 1);

    let detail = api.session_detail(&result.outcome.session_id).unwrap();
    assert_eq!(detail.lines.len(), 1);
    assert_eq!(detail.lines[0].line.item_id, diff.item_id);

    let conn = env.raw_conn();
    let same_movements: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM movements WHERE item_id = ?1",
            [&same.item_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(same_movements, 1);
}

#[test]
fn test_nothing_to_save() {
    let env = TestEnv::new().unwrap();
    let item = env.create_item("رسمة 1", "1");
    env.purchase(&item, date(2026, 3, 1), dec!(2), 1);

    let api = &env.state.reconciliation_api;
    let snapshot = api.load_sheet(true).unwrap();
    let entries = vec![CountEntry::new(&item.item_id, Some(dec!(2)), Some(dec!(1)))];

    let err = api
        .commit(date(2026, 3, 31), None, &entries, &snapshot)
        .unwrap_err();
    assert!(matches!(err, ApiError::NothingToSave));
    assert!(api.list_sessions(None, None).unwrap().is_empty());
}

#[test]
fn test_record_policy_keeps_confirmation_lines() {
    let env = TestEnv::new().unwrap();
    env.state
        .config_api
        .update_config(config_keys::ZERO_DIFF_POLICY, "RECORD")
        .unwrap();
    let item = env.create_item("رسمة 1", "1");
    env.purchase(&item, date(2026, 3, 1), dec!(2), 1);

    let api = &env.state.reconciliation_api;
    let snapshot = api.load_sheet(true).unwrap();
    let entries = vec![CountEntry::new(&item.item_id, Some(dec!(2)), Some(dec!(1)))];
    let result = api
        .commit(date(2026, 3, 31), None, &entries, &snapshot)
        .unwrap();

    assert_eq!(result.outcome.applied_count, 0);
    assert_eq!(result.outcome.recorded_lines, 1);
    let sessions = api.list_sessions(None, None).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].line_count, 1);
    assert_eq!(count_rows(&env.raw_conn(), "movements"), 1);
}

// ==========================================
// 原子性
// ==========================================

#[test]
fn test_commit_is_atomic_when_line_insert_fails() {
    let env = TestEnv::new().unwrap();
    let item = env.create_item("رسمة 1", "1");
    env.purchase(&item, date(2026, 3, 1), dec!(10), 5);

    let api = &env.state.reconciliation_api;
    let snapshot = api.load_sheet(true).unwrap();

    // 会话头写入之后、盘点行写入时失败
    env.raw_conn()
        .execute_batch(
            "CREATE TRIGGER fail_audit_lines BEFORE INSERT ON audit_lines
             BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
        )
        .unwrap();

    let entries = vec![CountEntry::new(&item.item_id, Some(dec!(9)), Some(dec!(5)))];
    let result = api.commit(date(2026, 3, 31), None, &entries, &snapshot);
    assert!(result.is_err());

    let conn = env.raw_conn();
    assert_eq!(count_rows(&conn, "audit_sessions"), 0);
    assert_eq!(count_rows(&conn, "audit_lines"), 0);
    assert_eq!(count_rows(&conn, "movements"), 1);
    assert_eq!(
        env.state.stock_api.current_balances().unwrap()[&item.item_id],
        Balance::new(dec!(10), 5)
    );
}

// ==========================================
// 账面复核
// ==========================================

#[test]
fn test_accept_stale_uses_loaded_book() {
    let env = TestEnv::new().unwrap();
    let item = env.create_item("رسمة 1", "1");
    env.purchase(&item, date(2026, 3, 1), dec!(10), 5);

    let api = &env.state.reconciliation_api;
    let snapshot = api.load_sheet(true).unwrap();
    // 加载后又卖出一笔
    env.sale(&item, date(2026, 3, 30), dec!(1), 1);

    let entries = vec![CountEntry::new(&item.item_id, Some(dec!(9)), Some(dec!(4)))];
    let result = api
        .commit(date(2026, 3, 31), None, &entries, &snapshot)
        .unwrap();
    assert_eq!(result.outcome.applied_count, 1);

    // 差异按快照计算（-1 / -1），再叠加期间的销售
    assert_eq!(
        env.state.stock_api.current_balances().unwrap()[&item.item_id],
        Balance::new(dec!(8), 3)
    );
}

#[test]
fn test_revalidate_rejects_changed_book() {
    let env = TestEnv::new().unwrap();
    env.state
        .config_api
        .update_config(config_keys::BOOK_CHECK, "REVALIDATE")
        .unwrap();
    let item = env.create_item("رسمة 1", "1");
    env.purchase(&item, date(2026, 3, 1), dec!(10), 5);

    let api = &env.state.reconciliation_api;
    let snapshot = api.load_sheet(true).unwrap();
    env.sale(&item, date(2026, 3, 30), dec!(1), 1);

    let entries = vec![CountEntry::new(&item.item_id, Some(dec!(9)), Some(dec!(4)))];
    let err = api
        .commit(date(2026, 3, 31), None, &entries, &snapshot)
        .unwrap_err();
    match err {
        ApiError::BookBalanceChanged(items) => assert_eq!(items.len(), 1),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(api.list_sessions(None, None).unwrap().is_empty());

    // 重新加载后可以提交
    let fresh = api.load_sheet(true).unwrap();
    let entries = vec![CountEntry::new(&item.item_id, Some(dec!(8.5)), Some(dec!(4)))];
    assert!(api.commit(date(2026, 3, 31), None, &entries, &fresh).is_ok());
}

// ==========================================
// 封存
// ==========================================

#[test]
fn test_movements_before_audit_are_sealed() {
    let env = TestEnv::new().unwrap();
    let item = env.create_item("رسمة 1", "1");
    let before = env.purchase(&item, date(2026, 3, 1), dec!(10), 5);

    let api = &env.state.reconciliation_api;
    let snapshot = api.load_sheet(true).unwrap();
    let entries = vec![CountEntry::new(&item.item_id, Some(dec!(9)), Some(dec!(5)))];
    api.commit(date(2026, 3, 31), None, &entries, &snapshot)
        .unwrap();

    let err = env.state.movement_api.void(&before.movement_id, None).unwrap_err();
    assert!(matches!(err, ApiError::MovementSealed(_)), "{:?}", err);
    assert!(matches!(
        env.state.movement_api.delete(&before.movement_id),
        Err(ApiError::MovementSealed(_))
    ));

    // 盘点日之后的流水不受影响
    let after = env.purchase(&item, date(2026, 4, 2), dec!(1), 1);
    assert!(env.state.movement_api.void(&after.movement_id, None).is_ok());
}

/// 三月盘点：实盘 9 / 5
fn audited_in_march(env: &TestEnv) -> textile_stock::domain::Item {
    let item = env.create_item("رسمة 1", "1");
    env.purchase(&item, date(2026, 3, 1), dec!(10), 5);
    let api = &env.state.reconciliation_api;
    let snapshot = api.load_sheet(true).unwrap();
    let entries = vec![CountEntry::new(&item.item_id, Some(dec!(9)), Some(dec!(5)))];
    api.commit(date(2026, 3, 31), None, &entries, &snapshot)
        .unwrap();
    item
}

fn march_close(env: &TestEnv, item_id: &str) -> Balance {
    env.state
        .stock_api
        .balances_as_of(date(2026, 3, 31), None)
        .unwrap()
        .into_iter()
        .find(|b| b.item.item_id == item_id)
        .unwrap()
        .balance
}

#[test]
fn test_update_cannot_move_into_sealed_period() {
    let env = TestEnv::new().unwrap();
    let item = audited_in_march(&env);
    let april = env.purchase(&item, date(2026, 4, 2), dec!(7), 3);
    assert_eq!(march_close(&env, &item.item_id), Balance::new(dec!(9), 5));

    // 改日期到盘点日之前
    let err = env
        .state
        .movement_api
        .update(
            &april.movement_id,
            &MovementPatch {
                move_date: Some(date(2026, 3, 10)),
                ..MovementPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::MovementSealed(_)), "{:?}", err);

    // 改到另一个已盘点的商品、同一封存期内
    let other = env.create_item("رسمة 2", "1");
    let other_march = env.purchase(&other, date(2026, 3, 5), dec!(1), 1);
    let snapshot = env.state.reconciliation_api.load_sheet(true).unwrap();
    env.state
        .reconciliation_api
        .commit(
            date(2026, 3, 31),
            None,
            &[CountEntry::new(&other.item_id, Some(dec!(2)), Some(dec!(1)))],
            &snapshot,
        )
        .unwrap();
    let moved = env.state.movement_api.supersede(
        &april.movement_id,
        &MovementPatch {
            item_id: Some(other.item_id.clone()),
            move_date: Some(date(2026, 3, 20)),
            ..MovementPatch::default()
        },
    );
    assert!(matches!(moved, Err(ApiError::MovementSealed(_))));
    assert!(env.state.movement_api.void(&other_march.movement_id, None).is_err());

    // 已盘点期间的余额不变，原流水仍有效
    assert_eq!(march_close(&env, &item.item_id), Balance::new(dec!(9), 5));
    let visible = env
        .state
        .movement_api
        .list(&MovementQuery {
            kind: Some(MovementKind::Purchase),
            date_from: Some(date(2026, 4, 1)),
            ..MovementQuery::default()
        })
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].movement.movement_id, april.movement_id);

    // 在未封存期间内更正仍然允许
    let fixed = env
        .state
        .movement_api
        .update(
            &april.movement_id,
            &MovementPatch {
                move_date: Some(date(2026, 4, 3)),
                ..MovementPatch::default()
            },
        )
        .unwrap();
    assert_eq!(fixed.move_date, date(2026, 4, 3));
}

#[test]
fn test_record_rejects_date_inside_sealed_period() {
    let env = TestEnv::new().unwrap();
    let item = audited_in_march(&env);
    let api = &env.state.movement_api;

    for d in [date(2026, 3, 15), date(2026, 3, 31)] {
        let err = api
            .record(MovementKind::Sale, d, &[line(&item.item_id, dec!(1), dec!(1))])
            .unwrap_err();
        assert!(matches!(err, ApiError::MovementSealed(_)), "{:?}", err);
    }
    assert_eq!(march_close(&env, &item.item_id), Balance::new(dec!(9), 5));

    // 盘点日之后、或未盘点的商品不受影响
    assert!(api
        .record(MovementKind::Sale, date(2026, 4, 1), &[line(&item.item_id, dec!(1), dec!(1))])
        .is_ok());
    let fresh = env.create_item("رسمة 9", "9");
    assert!(api
        .record(MovementKind::Purchase, date(2026, 3, 15), &[line(&fresh.item_id, dec!(1), dec!(1))])
        .is_ok());
}

#[test]
fn test_count_beyond_three_decimals_is_rejected() {
    let env = TestEnv::new().unwrap();
    let item = env.create_item("رسمة 1", "1");
    env.purchase(&item, date(2026, 3, 1), dec!(10), 5);

    let api = &env.state.reconciliation_api;
    let snapshot = api.load_sheet(true).unwrap();
    let entries = vec![CountEntry::new(&item.item_id, Some(dec!(9.0004)), Some(dec!(5)))];
    let err = api
        .commit(date(2026, 3, 31), None, &entries, &snapshot)
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)), "{:?}", err);
    assert_eq!(count_rows(&env.raw_conn(), "audit_sessions"), 0);
}

#[test]
fn test_list_sessions_rejects_inverted_range() {
    let env = TestEnv::new().unwrap();
    let err = env
        .state
        .reconciliation_api
        .list_sessions(Some(date(2026, 4, 1)), Some(date(2026, 3, 1)))
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}
