//! Kubernetes Cluster Client
//!
//! The subset of the Kubernetes API the game-server controllers consume,
//! behind a trait so reconcilers can run against an in-memory cluster in
//! unit tests.
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{ClusterClientTrait, KubeClusterClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeClusterClient::new(kube::Client::try_default().await?);
//!
//! // Nodes advertise the address pool through an annotation
//! for node in client.list_nodes().await? {
//!     println!("{:?}", node.metadata.annotations);
//! }
//!
//! // Children are read by name and created when absent
//! let pod = client.get_pod("default", "r1-pod").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeClusterClient;
pub use cluster_trait::ClusterClientTrait;
pub use error::ClusterError;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockClusterClient, MockOperation};
