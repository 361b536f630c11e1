#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    use crate::models::{Procedure, ProcedureUser, User};
    use crate::test::utils::{create_standard_test_db, setup_test_client};

    #[rocket::async_test]
    async fn test_health() {
        let (client, _) = setup_test_client(create_standard_test_db().await).await;

        let response = client.get("/health").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_string().await.unwrap(), "OK");
    }

    #[rocket::async_test]
    async fn test_add_single_user_api() {
        let (client, test_db) = setup_test_client(create_standard_test_db().await).await;

        let response = client
            .post("/procedures/AddUserToProcedure")
            .header(ContentType::JSON)
            .body(json!({ "procedureId": 36, "userId": 71 }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        assert!(response.into_string().await.unwrap_or_default().is_empty());
        assert_eq!(test_db.member_ids(36).await.unwrap(), vec![71]);
    }

    #[rocket::async_test]
    async fn test_add_user_list_api_replaces_membership() {
        let (client, test_db) = setup_test_client(create_standard_test_db().await).await;

        let response = client
            .post("/procedures/AddUserToProcedure")
            .header(ContentType::JSON)
            .body(json!({ "procedureId": 35, "userId": [70, 71, 555] }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        assert_eq!(test_db.member_ids(35).await.unwrap(), vec![70, 71]);
    }

    #[rocket::async_test]
    async fn test_add_user_error_statuses() {
        let (client, test_db) = setup_test_client(create_standard_test_db().await).await;

        let cases = vec![
            (json!({ "procedureId": 0, "userId": 69 }), Status::BadRequest),
            (json!({ "procedureId": -1, "userId": [69] }), Status::BadRequest),
            (json!({ "procedureId": 999, "userId": 69 }), Status::NotFound),
            (json!({ "procedureId": 999, "userId": [69] }), Status::NotFound),
            (json!({ "procedureId": 36, "userId": 999 }), Status::NotFound),
            (json!({ "procedureId": 35 }), Status::BadRequest),
            (json!({ "procedureId": "abc", "userId": 69 }), Status::BadRequest),
            (json!({ "procedureId": 35, "userId": "x" }), Status::BadRequest),
        ];

        for (body, expected) in cases {
            let response = client
                .post("/procedures/AddUserToProcedure")
                .header(ContentType::JSON)
                .body(body.to_string())
                .dispatch()
                .await;

            assert_eq!(response.status(), expected, "body: {}", body);
        }

        assert_eq!(test_db.association_count().await.unwrap(), 2);
    }

    #[rocket::async_test]
    async fn test_remove_user_api() {
        let (client, test_db) = setup_test_client(create_standard_test_db().await).await;

        let response = client
            .post("/procedures/RemoveUserFromProcedure")
            .header(ContentType::JSON)
            .body(json!({ "procedureId": 35, "userId": 69 }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(test_db.member_ids(35).await.unwrap(), vec![70]);

        let response = client
            .post("/procedures/RemoveUserFromProcedure")
            .header(ContentType::JSON)
            .body(json!({ "procedureId": 35, "userId": -1 }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert!(test_db.member_ids(35).await.unwrap().is_empty());

        let response = client
            .post("/procedures/RemoveUserFromProcedure")
            .header(ContentType::JSON)
            .body(json!({ "procedureId": 0, "userId": -1 }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client
            .post("/procedures/RemoveUserFromProcedure")
            .header(ContentType::JSON)
            .body(json!({ "procedureId": 404, "userId": 69 }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client
            .post("/procedures/RemoveUserFromProcedure")
            .header(ContentType::JSON)
            .body(json!({ "procedureId": 35, "userId": [70] }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client
            .post("/procedures/RemoveUserFromProcedure")
            .header(ContentType::JSON)
            .body("not json")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(test_db.member_ids(35).await.unwrap(), Vec::<i64>::new());
    }

    #[rocket::async_test]
    async fn test_list_rejects_unknown_expand() {
        let (client, _) = setup_test_client(create_standard_test_db().await).await;

        let response = client
            .get("/procedureusers?$expand=Procedure")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client.get("/users?$expand=User").dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn test_get_procedures_api() {
        let (client, _) = setup_test_client(create_standard_test_db().await).await;

        let response = client
            .get("/procedures?$orderby=ProcedureTitle%20asc&$top=1")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let body = response.into_string().await.unwrap();
        let procedures: Vec<Procedure> = serde_json::from_str(&body).unwrap();
        assert_eq!(procedures.len(), 1);
        assert_eq!(procedures[0].procedure_title, "Hip Replacement");
        assert_eq!(procedures[0].procedure_id, 36);

        let response = client
            .get("/procedures?$orderby=Unknown")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn test_get_procedure_users_api() {
        let (client, _) = setup_test_client(create_standard_test_db().await).await;

        let response = client
            .get("/procedureusers?procedureId=35&$expand=User")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let body = response.into_string().await.unwrap();
        let rows: Vec<ProcedureUser> = serde_json::from_str(&body).unwrap();
        let names: Vec<&str> = rows
            .iter()
            .filter_map(|row| row.user.as_ref().map(|u| u.name.as_str()))
            .collect();
        assert_eq!(names, vec!["Alice", "Bob"]);

        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value[0]["procedureId"], 35);
        assert_eq!(value[0]["userId"], 69);
        assert!(value[0]["createDate"].is_string());
    }

    #[rocket::async_test]
    async fn test_get_users_api() {
        let (client, _) = setup_test_client(create_standard_test_db().await).await;

        let response = client.get("/users").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let body = response.into_string().await.unwrap();
        let users: Vec<User> = serde_json::from_str(&body).unwrap();
        let ids: Vec<i64> = users.iter().map(|u| u.user_id).collect();
        assert_eq!(ids, vec![69, 70, 71]);
    }
}
