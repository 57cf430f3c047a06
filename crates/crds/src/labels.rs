//! Well-known label and annotation keys shared by game-server kinds.

/// Selector/label key marking a Pod or Service as belonging to a game server.
///
/// The value is the game-server kind (e.g. `teamspeak`). Any Service whose
/// selector carries this key claims its first external IP, whatever the kind.
pub const GAMESERVER_TYPE_LABEL: &str = "chinchilla.gameserver.type";

/// Label carrying the owning resource name.
pub const APP_LABEL: &str = "app";

/// Default node annotation holding the comma-separated address pool.
pub const DEFAULT_ADDRESS_ANNOTATION: &str = "chinchilla.gameservers.addresses";

/// API group of every game-server CRD.
pub const API_GROUP: &str = "gameservers.chinchilla.io";
