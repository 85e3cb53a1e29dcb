//! Reservation portal constants
//!
//! Locators and fixed identifiers for the gymnasium reservation portal. The
//! automation is deliberately specific to this one application; its page
//! structure is encoded here in a single place.

use crate::page::Selector;

/// Landing view of the sport venue reservation portal
pub const PORTAL_URL: &str = "https://ehall.szu.edu.cn/qljfwapp/sys/lwSzuCgyy/index.do#/sportVenue";

/// Login form: identifier input
pub fn username_input() -> Selector {
    Selector::xpath("//section//input[@id='username']")
}

/// Login form: secret input
pub fn password_input() -> Selector {
    Selector::xpath("//section//input[@id='password']")
}

/// Login form: remember-me checkbox
pub fn remember_me_checkbox() -> Selector {
    Selector::xpath("//div[@class=\"container-ge\"]//input[@type='checkbox']")
}

/// Login form: submit action
pub fn login_submit() -> Selector {
    Selector::xpath("//section//a[@id='login_submit']")
}

/// Campus selection button (粤海校区); only rendered once authenticated, which
/// makes it double as the login-confirmed marker
pub fn campus_button() -> Selector {
    Selector::text("div.bh-btn-primary", "粤海校区")
}

/// Venue tile image for a category, identified by the fixed image asset id
pub fn venue_tile(image_id: &str) -> Selector {
    Selector::css(format!("img.union-2[src*='{}']", image_id))
}

/// Grid cell labeled with a concrete calendar date
pub fn date_cell(date: &str) -> Selector {
    Selector::xpath(format!("//label/div[contains(.,'{}')]", date))
}

/// Time-slot entry carrying the requested label
pub fn time_slot(label: &str) -> Selector {
    Selector::text("div.element", label)
}

/// Slot entries still marked bookable (可预约)
pub fn bookable_slot() -> Selector {
    Selector::text("div.element", "可预约")
}

/// The single fitness resource (一楼健身房)
pub fn fitness_resource() -> Selector {
    Selector::text("div.element", "一楼健身房(")
}

/// Badminton resources that are both listed and still bookable
pub fn badminton_candidates() -> Selector {
    Selector::xpath("//label/div[contains(.,'可预约') and contains(.,'羽毛球场')]")
}

/// Any numbered court entry; used to detect that the court grid rendered
pub fn court_grid_ready() -> Selector {
    Selector::text("div.element", "号场(")
}

/// The rooftop outdoor basketball court (天台篮球4号场)
pub fn basketball_outdoor() -> Selector {
    Selector::text("div.element", "天台篮球4号场")
}

/// The east-hall indoor basketball court (东馆篮球3号场)
pub fn basketball_indoor() -> Selector {
    Selector::text("div.element", "东馆篮球3号场")
}

/// Booking submission button (提交预约)
pub fn submit_booking() -> Selector {
    Selector::text("button.bh-btn.bh-btn-default.bh-btn-large", "提交预约")
}

/// Link opening the unpaid order (未支付)
pub fn unpaid_order() -> Selector {
    Selector::text("a", "未支付")
}

/// Any pay-labeled action; the count decides the payment branch
pub fn pay_action() -> Selector {
    Selector::text("button", ")支付")
}

/// Direct payment from the standing account balance (剩余金额)
pub fn balance_pay() -> Selector {
    Selector::text("button", "(剩余金额)支付")
}

/// Funded-account payment (体育经费); opens the secondary payment view
pub fn fund_pay() -> Selector {
    Selector::text("button", "(体育经费)支付")
}

/// Confirmation step in the secondary payment view (下一步)
pub fn payment_next_step() -> Selector {
    Selector::text("button", "下一步")
}

/// Payment secret input that summons the virtual keypad
pub fn keypad_input() -> Selector {
    Selector::css("input#password")
}

/// One digit key of the virtual keypad
pub fn keypad_digit(digit: char) -> Selector {
    Selector::css(format!(".key-{}", digit))
}

/// Keypad confirmation button
pub fn keypad_confirm() -> Selector {
    Selector::css(".next-button-max")
}

/// Payment success indicator (支付成功)
pub fn payment_success() -> Selector {
    Selector::text("div,span,p", "支付成功")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_cell_embeds_date() {
        let selector = date_cell("2026-08-08");
        assert_eq!(
            selector,
            Selector::xpath("//label/div[contains(.,'2026-08-08')]")
        );
    }

    #[test]
    fn test_keypad_digit_selector() {
        assert_eq!(keypad_digit('7'), Selector::css(".key-7"));
    }
}
