//! Tests for built-in privileges and roles

use core_kernel::{BuiltInRole, Privilege};

#[test]
fn test_super_user_has_every_privilege() {
    for privilege in Privilege::ALL {
        assert!(BuiltInRole::SuperUser.grants(privilege));
    }
}

#[test]
fn test_students_cannot_post_dividends() {
    assert!(BuiltInRole::Student.grants(Privilege::TradeStocks));
    assert!(!BuiltInRole::Student.grants(Privilege::PostDividends));
    assert!(!BuiltInRole::Student.grants(Privilege::ResetWithdrawalLimits));
}

#[test]
fn test_admin_manages_ledger_jobs() {
    assert!(BuiltInRole::Admin.grants(Privilege::PostDividends));
    assert!(BuiltInRole::Admin.grants(Privilege::ResetWithdrawalLimits));
    assert!(!BuiltInRole::Admin.grants(Privilege::ManageInstances));
}

#[test]
fn test_privilege_codes_round_trip() {
    for privilege in Privilege::ALL {
        assert_eq!(privilege.code().parse::<Privilege>().unwrap(), privilege);
    }
    assert!("LAUNCH_ROCKETS".parse::<Privilege>().is_err());
}

#[test]
fn test_role_names() {
    let names: Vec<_> = BuiltInRole::ALL.iter().map(|r| r.to_string()).collect();
    assert_eq!(names, vec!["Student", "Teacher", "Admin", "Super User"]);
}
