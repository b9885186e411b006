use super::cart_checkout::{CartCheckout, CheckoutContact};
use super::parking_permit::{normalize_plate, ParkingPermit};
use crate::domain::value_objects::{EntryId, ResourceClass};
use crate::shared::error::LedgerError;
use chrono::{DateTime, Utc};

/// 種別ごとの必須入力項目。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPolicy {
    pub require_student_id: bool,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            require_student_id: true,
        }
    }
}

/// 貸出中カートと発行中許可証のインメモリ台帳。
///
/// 永続化は行わない。変更後の保存と再描画は呼び出し側の責務。
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    policy: LedgerPolicy,
    checkouts: Vec<CartCheckout>,
    permits: Vec<ParkingPermit>,
}

impl ResourceLedger {
    pub fn new(policy: LedgerPolicy) -> Self {
        Self {
            policy,
            checkouts: Vec::new(),
            permits: Vec::new(),
        }
    }

    pub fn policy(&self) -> LedgerPolicy {
        self.policy
    }

    pub fn add_checkout(
        &mut self,
        number: &str,
        contact: CheckoutContact,
        now: DateTime<Utc>,
    ) -> Result<CartCheckout, LedgerError> {
        let number = required(number, "number")?;
        let student_id = match contact.student_id.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => Some(value.to_string()),
            _ if self.policy.require_student_id => {
                return Err(LedgerError::Validation {
                    field: "studentId",
                });
            }
            _ => None,
        };
        let phone_number = required(&contact.phone_number, "phoneNumber")?;

        if self.checkouts.iter().any(|cart| cart.number == number) {
            return Err(LedgerError::Duplicate {
                class: ResourceClass::Cart,
                key: number,
            });
        }

        let checkout = CartCheckout {
            number,
            student_id,
            phone_number,
            checkout_time: now,
            id: EntryId::random(),
        };
        self.checkouts.push(checkout.clone());
        Ok(checkout)
    }

    pub fn add_permit(
        &mut self,
        license_plate: &str,
        phone_number: &str,
        now: DateTime<Utc>,
    ) -> Result<ParkingPermit, LedgerError> {
        let license_plate = normalize_plate(license_plate);
        if license_plate.is_empty() {
            return Err(LedgerError::Validation {
                field: "licensePlate",
            });
        }
        let phone_number = required(phone_number, "phoneNumber")?;

        if self
            .permits
            .iter()
            .any(|permit| permit.license_plate == license_plate)
        {
            return Err(LedgerError::Duplicate {
                class: ResourceClass::Permit,
                key: license_plate,
            });
        }

        let permit = ParkingPermit {
            license_plate,
            phone_number,
            issue_time: now,
            id: EntryId::random(),
        };
        self.permits.push(permit.clone());
        Ok(permit)
    }

    /// 存在しない ID の削除はエラーにしない。
    pub fn remove_checkout(&mut self, id: &EntryId) -> Option<CartCheckout> {
        let index = self.checkouts.iter().position(|cart| &cart.id == id)?;
        Some(self.checkouts.remove(index))
    }

    pub fn remove_permit(&mut self, id: &EntryId) -> Option<ParkingPermit> {
        let index = self.permits.iter().position(|permit| &permit.id == id)?;
        Some(self.permits.remove(index))
    }

    pub fn checkouts(&self) -> &[CartCheckout] {
        &self.checkouts
    }

    pub fn permits(&self) -> &[ParkingPermit] {
        &self.permits
    }

    /// カート一覧を丸ごと置き換える。リモートのスナップショット反映で使う。
    pub fn replace_checkouts(&mut self, checkouts: Vec<CartCheckout>) {
        self.checkouts = checkouts;
    }

    pub fn replace_permits(&mut self, permits: Vec<ParkingPermit>) {
        self.permits = permits;
    }

    pub fn checkout_ids(&self) -> impl Iterator<Item = &EntryId> {
        self.checkouts.iter().map(|cart| &cart.id)
    }
}

fn required(value: &str, field: &'static str) -> Result<String, LedgerError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::Validation { field });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap()
    }

    fn contact() -> CheckoutContact {
        CheckoutContact::new(Some("S1234".to_string()), "555-0100")
    }

    #[test]
    fn add_checkout_then_list_contains_single_entry() {
        let mut ledger = ResourceLedger::new(LedgerPolicy::default());
        let cart = ledger.add_checkout(" 7 ", contact(), now()).unwrap();

        assert_eq!(cart.number, "7");
        assert_eq!(cart.checkout_time, now());
        assert_eq!(
            ledger
                .checkouts()
                .iter()
                .filter(|c| c.number == "7")
                .count(),
            1
        );
    }

    #[test]
    fn duplicate_checkout_is_rejected_without_mutation() {
        let mut ledger = ResourceLedger::new(LedgerPolicy::default());
        ledger.add_checkout("7", contact(), now()).unwrap();

        let err = ledger.add_checkout("7", contact(), now()).unwrap_err();
        assert_eq!(
            err,
            LedgerError::Duplicate {
                class: ResourceClass::Cart,
                key: "7".to_string()
            }
        );
        assert_eq!(ledger.checkouts().len(), 1);
    }

    #[test]
    fn missing_student_id_depends_on_policy() {
        let mut strict = ResourceLedger::new(LedgerPolicy {
            require_student_id: true,
        });
        let err = strict
            .add_checkout("3", CheckoutContact::new(None, "555"), now())
            .unwrap_err();
        assert_eq!(err, LedgerError::Validation { field: "studentId" });
        assert!(strict.checkouts().is_empty());

        let mut relaxed = ResourceLedger::new(LedgerPolicy {
            require_student_id: false,
        });
        let cart = relaxed
            .add_checkout("3", CheckoutContact::new(Some("  ".to_string()), "555"), now())
            .unwrap();
        assert_eq!(cart.student_id, None);
    }

    #[test]
    fn blank_fields_fail_validation() {
        let mut ledger = ResourceLedger::new(LedgerPolicy::default());
        assert_eq!(
            ledger.add_checkout("  ", contact(), now()).unwrap_err(),
            LedgerError::Validation { field: "number" }
        );
        assert_eq!(
            ledger.add_permit("abc123", " ", now()).unwrap_err(),
            LedgerError::Validation {
                field: "phoneNumber"
            }
        );
        assert!(ledger.checkouts().is_empty());
        assert!(ledger.permits().is_empty());
    }

    #[test]
    fn permit_plates_are_uppercased_and_unique() {
        let mut ledger = ResourceLedger::new(LedgerPolicy::default());
        let permit = ledger.add_permit(" abc123 ", "555-0101", now()).unwrap();
        assert_eq!(permit.license_plate, "ABC123");

        let err = ledger.add_permit("ABC123", "555-0102", now()).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Duplicate {
                class: ResourceClass::Permit,
                ..
            }
        ));
        assert_eq!(ledger.permits().len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut ledger = ResourceLedger::new(LedgerPolicy::default());
        let cart = ledger.add_checkout("1", contact(), now()).unwrap();
        ledger.add_checkout("2", contact(), now()).unwrap();

        assert!(ledger.remove_checkout(&cart.id).is_some());
        assert_eq!(ledger.checkouts().len(), 1);
        assert!(ledger.remove_checkout(&cart.id).is_none());
        assert_eq!(ledger.checkouts().len(), 1);

        let permit = ledger.add_permit("xyz", "555", now()).unwrap();
        assert!(ledger.remove_permit(&permit.id).is_some());
        assert!(ledger.remove_permit(&permit.id).is_none());
        assert!(ledger.permits().is_empty());
    }

    #[test]
    fn checkouts_keep_insertion_order() {
        let mut ledger = ResourceLedger::new(LedgerPolicy::default());
        for number in ["9", "2", "5"] {
            ledger.add_checkout(number, contact(), now()).unwrap();
        }
        let numbers: Vec<_> = ledger.checkouts().iter().map(|c| c.number.as_str()).collect();
        assert_eq!(numbers, vec!["9", "2", "5"]);
    }

    #[test]
    fn checked_in_cart_number_can_be_reused() {
        let mut ledger = ResourceLedger::new(LedgerPolicy::default());
        let first = ledger.add_checkout("4", contact(), now()).unwrap();
        ledger.remove_checkout(&first.id);

        let second = ledger.add_checkout("4", contact(), now()).unwrap();
        assert_ne!(first.id, second.id);
    }
}
