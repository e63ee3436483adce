//! Behaviour against a reachable (mocked) backend.

mod common;

use bibsync::cache::SqliteStorage;
use bibsync::library::{
  Author, AuthorPatch, Book, Category, Loan, LoanStatus, NewAuthor, NewLoan,
};
use bibsync::repository::{local_id, Repository};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{ok, repository, store};

async fn authors(server: &MockServer) -> Repository<Author, SqliteStorage> {
  repository(&format!("{}/api", server.uri()), "autores", store())
}

#[tokio::test]
async fn test_load_all_replaces_cache_with_backend() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/autores"))
    .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!([
      {"_id": "a1", "nome": "Graciliano Ramos", "nacionalidade": "Brasileira"},
      {"_id": "a2", "nome": "Rachel de Queiroz"}
    ]))))
    .mount(&server)
    .await;

  let mut repo = authors(&server).await;
  let first = repo.load_all().await.to_vec();
  let second = repo.load_all().await.to_vec();

  assert!(repo.is_backend_available());
  assert_eq!(first.len(), 2);
  assert_eq!(first, second);
  assert_eq!(first[0].id, "a1");
}

#[tokio::test]
async fn test_load_all_keeps_pending_local_records() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/autores"))
    .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!([
      {"_id": "a1", "nome": "Graciliano Ramos"}
    ]))))
    .mount(&server)
    .await;

  let mut repo = authors(&server).await;
  let pending = repo.save_local(NewAuthor::new("Jorge Amado")).unwrap();

  let loaded = repo.load_all().await.to_vec();
  assert_eq!(loaded.len(), 2);
  assert_eq!(loaded[0].id, "a1");
  assert_eq!(loaded[1].id, pending.id);
}

#[tokio::test]
async fn test_save_uses_backend_identity() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/api/autores"))
    .and(body_partial_json(json!({"nome": "Cecília Meireles"})))
    .respond_with(ResponseTemplate::new(201).set_body_json(ok(json!(
      {"_id": "65f0", "nome": "Cecília Meireles", "nacionalidade": "Brasileira"}
    ))))
    .expect(1)
    .mount(&server)
    .await;

  let mut repo = authors(&server).await;
  let saved = repo
    .save(NewAuthor::new("Cecília Meireles").nationality("Brasileira"))
    .await
    .unwrap();

  assert_eq!(saved.id, "65f0");
  assert!(!local_id::is_local(&saved.id));
  assert!(repo.is_backend_available());
  assert_eq!(repo.list(), &[saved]);
}

#[tokio::test]
async fn test_server_error_demotes_and_saves_locally() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/api/autores"))
    .respond_with(ResponseTemplate::new(500))
    .mount(&server)
    .await;

  let mut repo = authors(&server).await;
  let saved = repo.save(NewAuthor::new("Hilda Hilst")).await.unwrap();

  assert!(local_id::is_local(&saved.id));
  assert!(!repo.is_backend_available());
}

#[tokio::test]
async fn test_update_not_found_stays_online() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/autores"))
    .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!([
      {"_id": "a1", "nome": "Lima Barreto"}
    ]))))
    .mount(&server)
    .await;
  Mock::given(method("PUT"))
    .and(path("/api/autores/a1"))
    .respond_with(ResponseTemplate::new(404))
    .mount(&server)
    .await;

  let mut repo = authors(&server).await;
  repo.load_all().await;

  let patch = AuthorPatch {
    biography: Some("Escritor carioca".into()),
    ..Default::default()
  };
  let updated = repo.update("a1", patch).await.unwrap();

  assert_eq!(updated.id, "a1");
  assert_eq!(updated.biography, "Escritor carioca");
  assert!(repo.is_backend_available());
}

#[tokio::test]
async fn test_update_on_backend_keeps_id() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/autores"))
    .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!([
      {"_id": "a1", "nome": "Lima Barreto"}
    ]))))
    .mount(&server)
    .await;
  Mock::given(method("PUT"))
    .and(path("/api/autores/a1"))
    .and(body_partial_json(json!({"nacionalidade": "Brasileira"})))
    .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!(
      {"_id": "a1", "nome": "Lima Barreto", "nacionalidade": "Brasileira"}
    ))))
    .expect(1)
    .mount(&server)
    .await;

  let mut repo = authors(&server).await;
  repo.load_all().await;

  let patch = AuthorPatch {
    nationality: Some("Brasileira".into()),
    ..Default::default()
  };
  let updated = repo.update("a1", patch).await.unwrap();
  assert_eq!(updated.id, "a1");
  assert_eq!(repo.list()[0].nationality, "Brasileira");
}

#[tokio::test]
async fn test_delete_on_backend() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/autores"))
    .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!([
      {"_id": "a1", "nome": "Lima Barreto"}
    ]))))
    .mount(&server)
    .await;
  Mock::given(method("DELETE"))
    .and(path("/api/autores/a1"))
    .respond_with(
      ResponseTemplate::new(200).set_body_json(json!({"success": true, "message": "removido"})),
    )
    .expect(1)
    .mount(&server)
    .await;

  let mut repo = authors(&server).await;
  repo.load_all().await;

  assert!(repo.delete("a1").await);
  assert!(repo.list().is_empty());
}

#[tokio::test]
async fn test_author_search_uses_backend() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/autores/search/Graciliano"))
    .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!([
      {"_id": "a1", "nome": "Graciliano Ramos"}
    ]))))
    .mount(&server)
    .await;

  let mut repo = authors(&server).await;
  let found = repo.find_by_name("Graciliano").await;
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].name, "Graciliano Ramos");
}

#[tokio::test]
async fn test_book_category_query() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/livros"))
    .and(query_param("categoria", "Literatura"))
    .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!([
      {"_id": "b1", "titulo": "Vidas Secas", "categoria": "Literatura",
       "autor": {"_id": "a1", "nome": "Graciliano Ramos"}}
    ]))))
    .mount(&server)
    .await;

  let mut repo: Repository<Book, _> =
    repository(&format!("{}/api", server.uri()), "livros", store());
  let found = repo.find_by_category(Category::Literature).await;

  assert_eq!(found.len(), 1);
  assert_eq!(found[0].author_name, "Graciliano Ramos");
}

#[tokio::test]
async fn test_return_loan_on_backend() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/emprestimos"))
    .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!([{
      "_id": "e1",
      "usuario": {"_id": "s1", "nome": "Ana Souza"},
      "livro": {"_id": "b1", "titulo": "Vidas Secas"},
      "dataEmprestimo": "2024-01-01T00:00:00.000Z",
      "dataDevolucaoPrevista": "2024-01-16T00:00:00.000Z",
      "status": "ativo"
    }]))))
    .mount(&server)
    .await;
  Mock::given(method("PATCH"))
    .and(path("/api/emprestimos/e1/devolver"))
    .and(body_partial_json(json!({"status": "devolvido"})))
    .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!({
      "_id": "e1",
      "usuario": "s1",
      "livro": "b1",
      "dataEmprestimo": "2024-01-01T00:00:00.000Z",
      "dataDevolucaoPrevista": "2024-01-16T00:00:00.000Z",
      "dataDevolucaoReal": "2024-01-10T00:00:00.000Z",
      "status": "devolvido"
    }))))
    .expect(1)
    .mount(&server)
    .await;

  let mut repo: Repository<Loan, _> =
    repository(&format!("{}/api", server.uri()), "emprestimos", store());
  repo.load_all().await;

  assert!(repo.return_loan("e1", "devolver").await);
  let loan = &repo.list()[0];
  assert_eq!(loan.status, LoanStatus::Returned);
  assert!(loan.return_date.is_some());
}

#[tokio::test]
async fn test_pending_loans_query() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/emprestimos"))
    .and(query_param("status", "ativo"))
    .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!([{
      "_id": "e1",
      "usuario": "s1",
      "livro": "b1",
      "dataEmprestimo": "2024-01-01T00:00:00.000Z",
      "status": "ativo"
    }]))))
    .mount(&server)
    .await;

  let mut repo: Repository<Loan, _> =
    repository(&format!("{}/api", server.uri()), "emprestimos", store());
  let pending = repo.find_pending().await;

  assert_eq!(pending.len(), 1);
  assert!(pending[0].is_pending());
}

#[tokio::test]
async fn test_save_loan_sends_wire_format() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/api/emprestimos"))
    .and(body_partial_json(json!({
      "usuario": "s1",
      "livro": "b1",
      "status": "ativo"
    })))
    .respond_with(ResponseTemplate::new(201).set_body_json(ok(json!({
      "_id": "e9",
      "usuario": "s1",
      "livro": "b1",
      "dataEmprestimo": "2024-01-01T00:00:00.000Z",
      "dataDevolucaoPrevista": "2024-01-16T00:00:00.000Z",
      "status": "ativo"
    }))))
    .expect(1)
    .mount(&server)
    .await;

  let mut repo: Repository<Loan, _> =
    repository(&format!("{}/api", server.uri()), "emprestimos", store());
  let saved = repo.save(NewLoan::new("s1", "b1")).await.unwrap();
  assert_eq!(saved.id, "e9");
}

#[tokio::test]
async fn test_orphaned_loan_keeps_backend_online() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/emprestimos"))
    .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!([
      {
        "_id": "e1",
        "usuario": {"_id": "s1", "nome": "Ana Souza"},
        "livro": {"_id": "b1", "titulo": "Vidas Secas"},
        "dataEmprestimo": "2024-01-01T00:00:00.000Z",
        "status": "ativo"
      },
      {
        "_id": "e2",
        "usuario": {"_id": "s2", "nome": "Bruno Lima"},
        "livro": null,
        "dataEmprestimo": "2024-01-02T00:00:00.000Z",
        "status": "ativo"
      },
      {"_id": "e3", "usuario": "s3", "livro": "b3"}
    ]))))
    .mount(&server)
    .await;

  let mut repo: Repository<Loan, _> =
    repository(&format!("{}/api", server.uri()), "emprestimos", store());
  let loaded = repo.load_all().await.to_vec();

  assert!(repo.is_backend_available());
  let ids: Vec<_> = loaded.iter().map(|l| l.id.as_str()).collect();
  assert_eq!(ids, vec!["e1", "e2"]);
  assert_eq!(loaded[1].book_id, "");
  assert_eq!(loaded[1].student_name, "Bruno Lima");
}
