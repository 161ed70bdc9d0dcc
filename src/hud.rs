//! Overlay indicator drawn while automation is active.

pub const INDICATOR_LABEL: &str = "\u{2714} SellHelper Active";
pub const INDICATOR_COLOR: u32 = 0x55FF55;

/// Label placement in scaled screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indicator {
    pub label: &'static str,
    pub x: i32,
    pub y: i32,
    pub color: u32,
}

/// Where to draw the indicator, or `None` when automation is off.
///
/// The label sits 100 px right of the crosshair, vertically centred on it.
pub fn indicator(is_active: bool, width: i32, height: i32) -> Option<Indicator> {
    is_active.then(|| Indicator {
        label: INDICATOR_LABEL,
        x: width / 2 + 100,
        y: height / 2 - 4,
        color: INDICATOR_COLOR,
    })
}
