use std::collections::HashMap;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

mod common;

use common::{create_test_app, TestApp, PASSWORD};

async fn daily_words(app: &TestApp, token: &str) -> Vec<Value> {
    let (status, body) = app.get("/api/words/daily", Some(token)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"].as_array().unwrap().clone()
}

#[tokio::test]
async fn health_endpoints_report_connected_database() {
    let app = create_test_app().await;

    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");

    let (status, body) = app.get("/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["cache"], "disabled");

    let (status, _) = app.get("/health/live", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/health/info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["environment"], "test");
}

#[tokio::test]
async fn protected_routes_require_token() {
    let app = create_test_app().await;

    let (status, body) = app.get("/api/users/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = app.get("/api/words/daily", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_route_falls_back_to_json_404() {
    let app = create_test_app().await;
    let (status, body) = app.get("/api/nothing-here", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn registration_validation_and_duplicates() {
    let app = create_test_app().await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({
                "username": "meena",
                "email": "meena@example.com",
                "password": PASSWORD,
                "passwordConfirm": "different1",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = app
        .post(
            "/api/auth/register",
            None,
            json!({
                "username": "meena",
                "email": "meena@example.com",
                "password": "onlyletters",
                "passwordConfirm": "onlyletters",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.register("meena").await;
    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({
                "username": "MEENA",
                "email": "other@example.com",
                "password": PASSWORD,
                "passwordConfirm": PASSWORD,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn login_logout_revokes_token() {
    let app = create_test_app().await;
    app.register("arun").await;

    let (status, _) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "arun@example.com", "password": "wrong-pass1" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "ARUN@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = app.get("/api/auth/verify", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["username"], "arun");

    let (status, _) = app.post("/api/auth/logout", Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/auth/verify", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_update_is_validated() {
    let app = create_test_app().await;
    let token = app.register("lakshmi").await;

    let (status, _) = app
        .request(
            Method::PUT,
            "/api/users/me",
            Some(&token),
            Some(json!({ "dailyWordGoal": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .request(
            Method::PUT,
            "/api/users/me",
            Some(&token),
            Some(json!({ "dailyWordGoal": 5, "uiLanguage": "ta", "tamilLevel": "intermediate" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["dailyWordGoal"], 5);
    assert_eq!(body["data"]["uiLanguage"], "ta");
    assert_eq!(body["data"]["tamilLevel"], "intermediate");
    assert_eq!(body["data"]["wordsLearnedCount"], 0);
}

#[tokio::test]
async fn daily_words_respect_goal_and_level() {
    let app = create_test_app().await;
    let token = app.register("kavin").await;

    let words = daily_words(&app, &token).await;
    assert_eq!(words.len(), 10);
    for word in &words {
        let difficulty = word["difficulty"].as_i64().unwrap();
        assert!((1..=2).contains(&difficulty));
        assert!(word["progress"].is_null());
    }

    let (status, _) = app.get("/api/words/daily?limit=51", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/api/words/search?q=water", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["transliteration"], "thanneer");
}

#[tokio::test]
async fn mark_learned_promotes_new_word_only() {
    let app = create_test_app().await;
    let token = app.register("selvi").await;
    let words = daily_words(&app, &token).await;
    let word_id = words[0]["id"].as_str().unwrap();

    let uri = format!("/api/words/{word_id}/mark-learned");
    let (status, body) = app.post(&uri, Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["progress"]["masteryLevel"], "learning");
    assert_eq!(body["data"]["progress"]["timesSeen"], 0);

    let (status, body) = app.get(&format!("/api/words/{word_id}"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["progress"]["masteryLevel"], "learning");

    let (status, _) = app
        .post("/api/words/missing-word/mark-learned", Some(&token), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn word_lists_enforce_ownership() {
    let app = create_test_app().await;
    let owner = app.register("priya").await;
    let other = app.register("ravi").await;

    let (status, body) = app
        .post(
            "/api/words/lists",
            Some(&owner),
            json!({ "name": "Feelings", "isPublic": false }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let private_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .get(&format!("/api/words/lists/{private_id}"), Some(&other))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app
        .post(
            "/api/words/lists",
            Some(&owner),
            json!({ "name": "Greetings", "isPublic": true }),
        )
        .await;
    let public_id = body["data"]["id"].as_str().unwrap().to_string();

    let word_id = daily_words(&app, &owner).await[0]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let words_uri = format!("/api/words/lists/{public_id}/words");

    let (status, _) = app
        .post(&words_uri, Some(&owner), json!({ "wordId": word_id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .post(&words_uri, Some(&owner), json!({ "wordId": word_id }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .get(&format!("/api/words/lists/{public_id}"), Some(&other))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["words"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .post(&words_uri, Some(&other), json!({ "wordId": word_id }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/words/lists/{public_id}"),
            Some(&other),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/api/words/lists", Some(&other)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn quiz_flow_updates_progress_and_leaderboard() {
    let app = create_test_app().await;
    let token = app.register("tamilselvan").await;

    let words = daily_words(&app, &token).await;
    let tamil_by_id: HashMap<String, String> = words
        .iter()
        .map(|w| {
            (
                w["id"].as_str().unwrap().to_string(),
                w["tamilWord"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    let word_ids: Vec<&str> = words.iter().take(3).map(|w| w["id"].as_str().unwrap()).collect();

    let (status, body) = app
        .post(
            "/api/quizzes/start",
            Some(&token),
            json!({ "quizType": "daily", "wordIds": word_ids, "questionTypes": ["typing"] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let session_id = body["data"]["session"]["id"].as_str().unwrap().to_string();
    let questions = body["data"]["questions"].as_array().unwrap().clone();
    assert_eq!(questions.len(), 3);
    assert!(questions[0].get("correctAnswer").is_none());

    let answer_uri = format!("/api/quizzes/{session_id}/answer");
    let first = &questions[0];
    let first_id = first["id"].as_str().unwrap();
    let first_answer = &tamil_by_id[first["wordId"].as_str().unwrap()];

    let (status, body) = app
        .post(
            &answer_uri,
            Some(&token),
            json!({ "questionId": first_id, "userAnswer": first_answer, "responseTime": 4.2 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["data"];
    assert_eq!(data["isCorrect"], true);
    assert_eq!(data["xpEarned"], 10);
    assert_eq!(data["progress"]["previousMasteryLevel"], "new");
    assert_eq!(data["progress"]["masteryLevel"], "learning");
    assert_eq!(data["progress"]["masteryChange"], "promoted");
    assert_eq!(data["quizCompleted"], false);
    assert!(data["nextQuestion"].is_object());

    let (status, body) = app
        .post(
            &answer_uri,
            Some(&token),
            json!({ "questionId": first_id, "userAnswer": first_answer }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_ANSWERED");

    // the rejected retry must not have touched the progress row
    let first_word = first["wordId"].as_str().unwrap();
    let (status, body) = app.get(&format!("/api/words/{first_word}"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let progress = &body["data"]["progress"];
    assert_eq!(progress["timesSeen"], 1);
    assert_eq!(progress["timesCorrect"], 1);
    assert_eq!(progress["reviewIntervalDays"], 3);
    assert_eq!(progress["easeFactor"], 2.6);

    // answer XP shows on the board before the quiz is completed
    let (status, body) = app.get("/api/progress/leaderboard", Some(&token)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["currentUserRank"], 1);
    assert!(body["data"]["currentUserXp"].as_i64().unwrap() >= 10);

    let second = &questions[1];
    let (status, body) = app
        .post(
            &answer_uri,
            Some(&token),
            json!({
                "questionId": second["id"],
                "userAnswer": tamil_by_id[second["wordId"].as_str().unwrap()],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = app
        .post(
            &answer_uri,
            Some(&token),
            json!({ "questionId": questions[2]["id"], "userAnswer": "wrong answer" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["isCorrect"], false);
    assert_eq!(body["data"]["xpEarned"], 0);
    assert_eq!(body["data"]["progress"]["masteryChange"], "unchanged");
    assert_eq!(body["data"]["quizCompleted"], true);

    let complete_uri = format!("/api/quizzes/{session_id}/complete");
    let (status, body) = app.post(&complete_uri, Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let summary = &body["data"];
    assert_eq!(summary["session"]["correctAnswers"], 2);
    assert_eq!(summary["session"]["isCompleted"], true);
    assert_eq!(summary["answerXp"], 20);
    assert_eq!(summary["wordResults"].as_array().unwrap().len(), 3);

    let (status, body) = app.post(&complete_uri, Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "QUIZ_COMPLETED");

    let (status, body) = app
        .post(
            &answer_uri,
            Some(&token),
            json!({ "questionId": first_id, "userAnswer": first_answer }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = app.get(&format!("/api/quizzes/{session_id}"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["questions"][0]["correctAnswer"], first_answer.as_str());

    let (status, body) = app.get("/api/quizzes/history", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["total"], 1);

    let (status, body) = app.get("/api/progress/dashboard", Some(&token)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let daily = &body["data"]["dailyProgress"];
    assert_eq!(daily["wordsLearnedToday"], 2);
    assert_eq!(daily["dailyGoal"], 10);
    assert_eq!(daily["streakCount"], 1);
    assert_eq!(body["data"]["masteryBreakdown"]["learning"], 2);

    let (status, body) = app.get("/api/progress/leaderboard", Some(&token)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["currentUserRank"], 1);
    assert!(body["data"]["currentUserXp"].as_i64().unwrap() >= 20);

    let (status, _) = app
        .get("/api/progress/leaderboard?type=yearly", Some(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/api/users/me/stats", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quizSessionsCompleted"], 1);
    assert_eq!(body["data"]["currentStreak"], 1);
}

#[tokio::test]
async fn other_users_cannot_see_quiz_sessions() {
    let app = create_test_app().await;
    let owner = app.register("nila").await;
    let intruder = app.register("vetri").await;

    let word_id = daily_words(&app, &owner).await[0]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let (_, body) = app
        .post(
            "/api/quizzes/start",
            Some(&owner),
            json!({ "quizType": "custom", "wordIds": [word_id] }),
        )
        .await;
    let session_id = body["data"]["session"]["id"].as_str().unwrap();

    let (status, _) = app
        .get(&format!("/api/quizzes/{session_id}"), Some(&intruder))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .post(
            "/api/quizzes/start",
            Some(&owner),
            json!({ "quizType": "daily", "wordIds": ["no-such-word"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn achievements_catalog_is_seeded() {
    let app = create_test_app().await;
    let token = app.register("ilakkiya").await;

    let (status, body) = app.get("/api/gamification/achievements", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let catalog = body["data"].as_array().unwrap();
    assert_eq!(catalog.len(), 8);
    assert!(catalog.iter().all(|a| a["isEarned"] == false));

    let (status, body) = app
        .get("/api/gamification/achievements/progress", Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 8);
}
