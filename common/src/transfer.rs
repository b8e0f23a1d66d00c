use crate::wallet::Rejection;

/// Check a proposed transfer against the current balance.
///
/// Rules run in order and the first failure is reported: recipient, then
/// amount well-formedness, then funds.
pub fn validate_transfer(recipient: &str, amount: f64, balance: f64) -> Result<(), Rejection> {
    if recipient.trim().is_empty() {
        return Err(Rejection::InvalidRecipient);
    }
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Rejection::InvalidAmount);
    }
    if amount > balance {
        return Err(Rejection::InsufficientBalance);
    }
    Ok(())
}

/// Short display form of an address, e.g. `SP2J6Z...`.
pub fn abbreviate_address(address: &str) -> String {
    let prefix: String = address.chars().take(6).collect();
    format!("{prefix}...")
}
