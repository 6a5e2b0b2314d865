//! Error type for the simulation controller

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("No suitable GPU adapter found: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),

    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Compute substrate initialization failed: {0}")]
    Substrate(#[from] wgpu::Error),

    #[error("Grid width {0} is not usable (must be non-zero and width² must fit in u32)")]
    InvalidGridWidth(u32),

    #[error("Grid width {width} exceeds the device's 2D texture limit of {limit}")]
    GridExceedsDevice { width: u32, limit: u32 },

    #[error("Simulation is full: all {capacity} slots are in use")]
    CapacityExceeded { capacity: u32 },

    #[error("Slot {index} is out of range (capacity {capacity})")]
    SlotOutOfRange { index: u32, capacity: u32 },

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Readback was dropped before the buffer was mapped")]
    ReadbackAborted,

    #[error("Device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),
}

pub type Result<T, E = SimulationError> = std::result::Result<T, E>;
