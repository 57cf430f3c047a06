//! Unit tests for the address allocator

#[cfg(test)]
mod tests {
    use crate::allocator::{AddressAllocator, Allocation, select_free_address};
    use crate::test_utils::*;
    use cluster_client::{MockClusterClient, MockOperation};
    use crds::DEFAULT_ADDRESS_ANNOTATION;
    use k8s_openapi::api::core::v1::Node;

    fn allocation(node: &str, address: &str) -> Option<Allocation> {
        Some(Allocation {
            node: node.to_string(),
            address: address.to_string(),
        })
    }

    #[test]
    fn test_select_lowest_free_address() {
        let nodes = vec![create_test_node("h1", "10.0.0.2,10.0.0.1")];

        let selected = select_free_address(&nodes, &[], DEFAULT_ADDRESS_ANNOTATION);

        assert_eq!(selected, allocation("h1", "10.0.0.1"));
    }

    #[test]
    fn test_claimed_address_excluded() {
        let nodes = vec![create_test_node("h1", "10.0.0.1,10.0.0.2")];
        let services = vec![create_test_gameserver_service("games", "other-svc", "teamspeak", &["10.0.0.1"])];

        let selected = select_free_address(&nodes, &services, DEFAULT_ADDRESS_ANNOTATION);

        assert_eq!(selected, allocation("h1", "10.0.0.2"));
    }

    #[test]
    fn test_claims_by_other_gameserver_kinds_excluded() {
        let nodes = vec![create_test_node("h1", "10.0.0.1,10.0.0.2")];
        let services = vec![create_test_gameserver_service("games", "mc-svc", "minecraft", &["10.0.0.1"])];

        let selected = select_free_address(&nodes, &services, DEFAULT_ADDRESS_ANNOTATION);

        assert_eq!(selected, allocation("h1", "10.0.0.2"));
    }

    #[test]
    fn test_services_without_gameserver_selector_ignored() {
        let nodes = vec![create_test_node("h1", "10.0.0.1")];
        let services = vec![create_test_plain_service("default", "web", &["10.0.0.1"])];

        let selected = select_free_address(&nodes, &services, DEFAULT_ADDRESS_ANNOTATION);

        assert_eq!(selected, allocation("h1", "10.0.0.1"));
    }

    #[test]
    fn test_only_first_external_ip_is_claimed() {
        let nodes = vec![create_test_node("h1", "10.0.0.1,10.0.0.2")];
        let services = vec![create_test_gameserver_service(
            "games",
            "ts-svc",
            "teamspeak",
            &["10.0.0.2", "10.0.0.1"],
        )];

        let selected = select_free_address(&nodes, &services, DEFAULT_ADDRESS_ANNOTATION);

        assert_eq!(selected, allocation("h1", "10.0.0.1"));
    }

    #[test]
    fn test_gameserver_service_without_external_ip_claims_nothing() {
        let nodes = vec![create_test_node("h1", "10.0.0.1")];
        let services = vec![create_test_gameserver_service("games", "ts-svc", "teamspeak", &[])];

        let selected = select_free_address(&nodes, &services, DEFAULT_ADDRESS_ANNOTATION);

        assert_eq!(selected, allocation("h1", "10.0.0.1"));
    }

    #[test]
    fn test_exhausted_pool_returns_none() {
        let nodes = vec![create_test_node("h1", "10.0.0.1,10.0.0.2")];
        let services = vec![
            create_test_gameserver_service("games", "a-svc", "teamspeak", &["10.0.0.1"]),
            create_test_gameserver_service("other", "b-svc", "teamspeak", &["10.0.0.2"]),
        ];

        assert_eq!(select_free_address(&nodes, &services, DEFAULT_ADDRESS_ANNOTATION), None);
    }

    #[test]
    fn test_no_nodes_returns_none() {
        assert_eq!(select_free_address(&[], &[], DEFAULT_ADDRESS_ANNOTATION), None);
    }

    #[test]
    fn test_nodes_without_annotation_or_empty_entries_ignored() {
        let nodes = vec![
            Node::default(),
            create_test_node("h1", ""),
            create_test_node("h2", " , ,"),
        ];

        assert_eq!(select_free_address(&nodes, &[], DEFAULT_ADDRESS_ANNOTATION), None);
    }

    #[test]
    fn test_entries_are_trimmed() {
        let nodes = vec![create_test_node("h1", " 10.0.0.5 , 10.0.0.4 ")];

        let selected = select_free_address(&nodes, &[], DEFAULT_ADDRESS_ANNOTATION);

        assert_eq!(selected, allocation("h1", "10.0.0.4"));
    }

    #[test]
    fn test_duplicate_address_last_node_wins() {
        let nodes = vec![
            create_test_node("h1", "10.0.0.1"),
            create_test_node("h2", "10.0.0.1"),
        ];

        let selected = select_free_address(&nodes, &[], DEFAULT_ADDRESS_ANNOTATION);

        assert_eq!(selected, allocation("h2", "10.0.0.1"));
    }

    #[test]
    fn test_union_across_nodes() {
        let nodes = vec![
            create_test_node("h1", "10.0.0.1"),
            create_test_node("h2", "10.0.0.2"),
        ];
        let services = vec![create_test_gameserver_service("games", "a-svc", "teamspeak", &["10.0.0.1"])];

        let selected = select_free_address(&nodes, &services, DEFAULT_ADDRESS_ANNOTATION);

        assert_eq!(selected, allocation("h2", "10.0.0.2"));
    }

    #[test]
    fn test_numeric_not_lexicographic_order() {
        let nodes = vec![create_test_node("h1", "10.0.0.10,10.0.0.9")];

        let selected = select_free_address(&nodes, &[], DEFAULT_ADDRESS_ANNOTATION);

        assert_eq!(selected, allocation("h1", "10.0.0.9"));
    }

    #[test]
    fn test_ip_addresses_before_unparseable_entries() {
        let nodes = vec![create_test_node("h1", "gs.example.com,192.168.0.1")];

        let selected = select_free_address(&nodes, &[], DEFAULT_ADDRESS_ANNOTATION);

        assert_eq!(selected, allocation("h1", "192.168.0.1"));
    }

    #[test]
    fn test_custom_annotation_key() {
        let nodes = vec![create_test_node("h1", "10.0.0.1")];

        assert_eq!(select_free_address(&nodes, &[], "example.com/other"), None);
    }

    #[test]
    fn test_never_returns_claimed_address() {
        // Every claimed subset of the pool leaves the claimed addresses out
        let pool = ["10.0.0.1", "10.0.0.2", "10.0.0.3"];
        let nodes = vec![create_test_node("h1", &pool.join(","))];

        for mask in 0u8..8 {
            let claimed: Vec<&str> = pool
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, ip)| *ip)
                .collect();
            let services: Vec<_> = claimed
                .iter()
                .enumerate()
                .map(|(i, ip)| create_test_gameserver_service("games", &format!("svc-{}", i), "teamspeak", &[*ip]))
                .collect();

            let selected = select_free_address(&nodes, &services, DEFAULT_ADDRESS_ANNOTATION);

            match selected {
                Some(a) => assert!(!claimed.contains(&a.address.as_str()), "mask {} returned {}", mask, a.address),
                None => assert_eq!(claimed.len(), pool.len(), "mask {} found nothing", mask),
            }
        }
    }

    #[tokio::test]
    async fn test_allocate_reads_live_cluster_state() {
        let mock = MockClusterClient::new();
        mock.add_node(create_test_node("h1", "10.0.0.1,10.0.0.2"));
        mock.add_service(create_test_gameserver_service("games", "a-svc", "teamspeak", &["10.0.0.1"]));
        let allocator = AddressAllocator::new(DEFAULT_ADDRESS_ANNOTATION);

        let first = allocator.allocate(&mock).await.unwrap();
        assert_eq!(first, allocation("h1", "10.0.0.2"));

        mock.add_service(create_test_gameserver_service("games", "b-svc", "teamspeak", &["10.0.0.2"]));
        assert_eq!(allocator.allocate(&mock).await.unwrap(), None);
        assert!(mock.writes().is_empty(), "allocation is read-only");
    }

    #[tokio::test]
    async fn test_allocate_propagates_list_errors() {
        let mock = MockClusterClient::new();
        mock.add_node(create_test_node("h1", "10.0.0.1"));
        mock.fail_on(MockOperation::ListServices);
        let allocator = AddressAllocator::new(DEFAULT_ADDRESS_ANNOTATION);

        assert!(allocator.allocate(&mock).await.is_err());
    }
}
