// Browser-side timing.

// Wait for the fullscreen layout to settle before resizing the surface
pub const FULLSCREEN_RESIZE_DELAY_MS: i32 = 100;
