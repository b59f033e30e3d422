//! Website scenario tests.

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};

    use crate::{TestServer, ZONE, create_body};

    const SITE: &str = "www.example.com";

    #[tokio::test]
    async fn test_should_create_website_with_distribution_and_alias() {
        let server = TestServer::new();

        let created = server
            .send(Method::POST, "/websites", Some(create_body(SITE)))
            .await;

        assert_eq!(created.status, StatusCode::ACCEPTED, "{}", created.json);
        assert_eq!(created.json["Distribution"]["Aliases"][0], SITE);
        assert!(created.json["DnsChange"]["Id"].is_string());

        let records = server.cloud.dns().records(ZONE);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_type, "A");
        let target = records[0].alias_target.as_ref().unwrap();
        assert_eq!(
            Some(target.dns_name.as_str()),
            created.json["Distribution"]["DomainName"].as_str()
        );
        assert!(server.cloud.object().website(SITE).is_some());
        assert!(server.cloud.object().bucket_policy(SITE).is_some());

        let listed = server.send(Method::GET, "/websites", None).await;
        assert_eq!(listed.status, StatusCode::OK);
        assert_eq!(listed.json["Distributions"][0]["Aliases"][0], SITE);

        let shown = server
            .send(Method::GET, &format!("/websites/{SITE}"), None)
            .await;
        assert_eq!(shown.status, StatusCode::OK);
        assert_eq!(shown.json["DistributionTags"][0]["Key"], "Team");
        assert_eq!(shown.json["DnsRecord"]["Type"], "A");
    }

    #[tokio::test]
    async fn test_should_reject_unknown_parent_domain_before_any_call() {
        let server = TestServer::new();

        let response = server
            .send(Method::POST, "/websites", Some(create_body("www.unknown.org")))
            .await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.json["Code"], "InvalidDomain");
        assert!(server.cloud.journal().is_empty());
    }

    #[tokio::test]
    async fn test_should_retry_delete_until_distribution_is_gone() {
        let server = TestServer::new();
        server.cloud.cdn().set_auto_deploy(false);
        let created = server
            .send(Method::POST, "/websites", Some(create_body(SITE)))
            .await;
        assert_eq!(created.status, StatusCode::ACCEPTED);

        let first = server
            .send(Method::DELETE, &format!("/websites/{SITE}"), None)
            .await;
        assert_eq!(first.status, StatusCode::ACCEPTED, "{}", first.json);
        assert_eq!(first.json["DistributionPending"], true);
        assert_eq!(first.json["DnsRecord"]["Name"], format!("{SITE}."));
        assert!(server.cloud.dns().records(ZONE).is_empty());

        server.cloud.cdn().deploy_all();
        let second = server
            .send(Method::DELETE, &format!("/websites/{SITE}"), None)
            .await;
        assert_eq!(second.status, StatusCode::OK, "{}", second.json);
        assert!(second.json.get("DistributionPending").is_none());
        assert!(server.cloud.cdn().is_empty());

        let third = server
            .send(Method::DELETE, &format!("/websites/{SITE}"), None)
            .await;
        assert_eq!(third.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_should_invalidate_website_cache() {
        let server = TestServer::new();
        server
            .send(Method::POST, "/websites", Some(create_body(SITE)))
            .await;

        let missing = server
            .send(Method::PATCH, &format!("/websites/{SITE}"), None)
            .await;
        assert_eq!(missing.status, StatusCode::BAD_REQUEST);
        assert_eq!(missing.json["Code"], "MissingCacheInvalidation");

        let patched = server
            .send(
                Method::PATCH,
                &format!("/websites/{SITE}"),
                Some(serde_json::json!({"CacheInvalidation": ["/index.html"]})),
            )
            .await;
        assert_eq!(patched.status, StatusCode::OK, "{}", patched.json);
        assert_eq!(patched.json["Invalidation"]["Paths"][0], "/index.html");
    }
}
