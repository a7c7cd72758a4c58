pub(crate) type RoadId = u16;
pub(crate) type MileMarker = u16;
pub(crate) type SpeedLimit = u16;
pub(crate) type Centimph = u16;
pub(crate) type Timestamp = u32;
pub(crate) type Day = u32;
pub(crate) type PlateNumber = Vec<u8>;
pub(crate) type HeartbeatInterval = u32;
