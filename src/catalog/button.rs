use crate::descriptor::{ButtonAction, DeviceClass, EntityCategory, EntityDescription as D, Kind};

pub(super) static BUTTON_TYPES: [D; 1] = [D::new(
    "detect_sub_devices",
    "detect_sub_devices",
    "Detect sub-devices",
    Kind::Button { action: ButtonAction::DetectSubDevices },
)
.always_available()
.device_class(DeviceClass::Update)
.category(EntityCategory::Diagnostic)];
