// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    BoundingBox, Located, Message, MessageFilter, MessageId, MessageWithPoint, NewMessage, NewPoint,
    Point, PointChanges, PointFilter, PointId, Principal, Ranked,
};
pub use requests::{
    CreateMessageRequest, CreatePointRequest, MessageListQuery, PointListQuery, SearchParams,
    UpdatePointRequest,
};
pub use responses::{
    DeletePointResponse, ErrorResponse, HealthResponse, MessageResponse, PointResponse,
};
