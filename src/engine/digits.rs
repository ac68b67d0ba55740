use crate::call::action::DigitsReceiveOption;

/// Activeflow variable under which received DTMF digits accumulate.
pub const DIGITS_VARIABLE: &str = "call.digits";

/// Whether digit collection has finished. Two finish conditions: enough
/// digits accumulated, or the last digit equals the finish key. A key
/// longer than one character can never match.
pub fn digits_complete(digits: &str, option: &DigitsReceiveOption) -> bool {
    if option.length > 0 && digits.chars().count() >= option.length {
        return true;
    }
    if !option.key.is_empty() {
        if let Some(last) = digits.chars().last() {
            if option.key == last.to_string() {
                return true;
            }
        }
    }
    false
}
