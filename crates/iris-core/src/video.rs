/// A decoded video frame in row-major RGBA8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl VideoFrame {
    /// Returns `true` when `rgba` holds exactly `width * height` pixels.
    pub fn is_consistent(&self) -> bool {
        (self.width as u64)
            .checked_mul(self.height as u64)
            .and_then(|px| px.checked_mul(4))
            .is_some_and(|len| len == self.rgba.len() as u64)
    }
}
