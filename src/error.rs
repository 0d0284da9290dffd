use thiserror::Error;

/// Error types for the assignment core
#[derive(Debug, Error)]
pub enum AssignmentError {
    /// Origin index outside `[0, n_cent)`
    #[error("Origin {0} is out of range.")]
    InvalidOrigin(usize),

    /// Node index outside `[0, num_nodes)`
    #[error("Node {0} is out of range.")]
    InvalidNode(usize),

    /// Link id outside `[0, num_links)`, or links added out of id order
    #[error("Link {0} is out of range or was added out of order.")]
    InvalidLink(usize),

    /// Non-finite or non-positive link parameter
    #[error("Link {link_id} has an invalid {name}: {value}")]
    InvalidLinkParameter {
        link_id: usize,
        name: &'static str,
        value: f64,
    },

    /// Centroids must occupy the node ids `[0, n_cent)`
    #[error("There are more centroids ({num_centroids}) than nodes ({num_nodes}).")]
    TooManyCentroids {
        num_centroids: usize,
        num_nodes: usize,
    },

    /// Negative or non-finite OD demand
    #[error("Demand {demand} for OD pair ({origin}, {destination}) is invalid.")]
    InvalidDemand {
        origin: usize,
        destination: usize,
        demand: f64,
    },

    /// Destination with no registered demand from this origin
    #[error("Destination {destination} has no demand registered from origin {origin}.")]
    UnknownDestination { origin: usize, destination: usize },

    /// Per-origin path arena is exhausted
    #[error("The path pool for origin {origin} is full ({capacity} paths).")]
    PathPoolFull { origin: usize, capacity: usize },

    /// No link connects two consecutive nodes of a shortest-path tree
    #[error("No link connects node {from} to node {to}.")]
    MissingLink { from: usize, to: usize },

    /// Shortest-path tree does not reach a destination with demand
    #[error("Destination {destination} is unreachable from origin {origin}.")]
    UnreachableDestination { origin: usize, destination: usize },

    /// Shortest paths requested before `set_edges`
    #[error("The link set has not been finalized; call set_edges first.")]
    EdgesNotSet,

    /// Caller-allocated buffer has the wrong length
    #[error("Buffer `{name}` has length {actual}, expected {expected}.")]
    BufferSize {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Quadratic programming solver failure
    #[error("Quadratic programming failed: {reason}")]
    QpSolveFailed { reason: String },
}

/// Result type alias for assignment operations
pub type Result<T> = std::result::Result<T, AssignmentError>;
