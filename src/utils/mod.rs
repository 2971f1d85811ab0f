mod hexdump;
mod xml_payload;

pub use hexdump::hex_preview;
pub use xml_payload::normalize_xml_payload;
