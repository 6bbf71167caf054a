use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{FromRequest, Path as UrlPath, Query, Request, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tera::{Context, Tera};
use tracing::{error, info, warn};

use factory_core::domain::garment::{GarmentId, NewGarment};
use factory_core::domain::product::{Category, NewProduct, ProductId};
use factory_core::errors::{ApplicationError, InterfaceError};
use factory_db::Inventory;

const EMBEDDED_TEMPLATES: [(&str, &str); 7] = [
    ("base.html", include_str!("../../../templates/base.html")),
    ("garment/index.html", include_str!("../../../templates/garment/index.html")),
    ("garment/show.html", include_str!("../../../templates/garment/show.html")),
    ("garment/create.html", include_str!("../../../templates/garment/create.html")),
    ("product/index.html", include_str!("../../../templates/product/index.html")),
    ("product/show.html", include_str!("../../../templates/product/show.html")),
    ("product/create.html", include_str!("../../../templates/product/create.html")),
];

pub const LIVENESS_MESSAGE: &str = "Garment factory inventory is running";

#[derive(Clone)]
pub struct InventoryState {
    pub inventory: Inventory,
    pub templates: Arc<Tera>,
}

/// Loads templates from `override_dir` when given; any template the directory
/// does not provide falls back to the copy compiled into the binary.
pub fn init_templates(override_dir: Option<&Path>) -> Arc<Tera> {
    let mut embedded = Tera::default();
    if let Err(e) = embedded.add_raw_templates(EMBEDDED_TEMPLATES) {
        error!(error = %e, "embedded inventory templates failed to parse");
    }

    let Some(dir) = override_dir else {
        return Arc::new(embedded);
    };

    let pattern = format!("{}/**/*.html", dir.display());
    match Tera::new(&pattern) {
        Ok(mut tera) => {
            if let Err(e) = tera.extend(&embedded) {
                warn!(error = %e, "failed to merge embedded templates into override set");
            }
            info!(templates_dir = %dir.display(), "inventory templates loaded from filesystem");
            Arc::new(tera)
        }
        Err(e) => {
            warn!(
                error = %e,
                templates_dir = %dir.display(),
                "failed to load templates from filesystem, using embedded templates"
            );
            Arc::new(embedded)
        }
    }
}

pub fn router(state: InventoryState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/garments", get(list_garments).post(create_garment))
        .route("/garments/create", get(new_garment_form))
        .route(
            "/garments/{id}",
            get(show_garment).delete(delete_garment).post(override_garment_method),
        )
        .route("/garments/{id}/product/create", get(new_product_form))
        .route("/garments/{id}/product", post(create_product_under_garment))
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(show_product).delete(delete_product).post(override_product_method),
        )
        .with_state(state)
}

/// Error page returned by every inventory handler. A failure never redirects.
#[derive(Debug)]
pub struct PageError(InterfaceError);

impl PageError {
    fn internal(message: impl Into<String>) -> Self {
        Self(InterfaceError::Internal { message: message.into(), correlation_id: correlation_id() })
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self(InterfaceError::BadRequest { message: message.into(), correlation_id: correlation_id() })
    }

    pub fn status(&self) -> StatusCode {
        match self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ApplicationError> for PageError {
    fn from(error: ApplicationError) -> Self {
        Self(error.into_interface(correlation_id()))
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.0;

        if status.is_server_error() {
            error!(
                event_name = "inventory.request.failed",
                correlation_id = %error.correlation_id(),
                status = status.as_u16(),
                error = %error,
                "inventory request failed"
            );
        } else {
            warn!(
                event_name = "inventory.request.rejected",
                correlation_id = %error.correlation_id(),
                status = status.as_u16(),
                error = %error,
                "inventory request rejected"
            );
        }

        // Server-side details stay in the log.
        let detail = if status.is_server_error() {
            String::new()
        } else {
            format!("<p>{}</p>", tera::escape_html(error.message()))
        };
        let body = format!(
            "<!DOCTYPE html><html><head><title>{code}</title></head><body>\
             <h1>{code}</h1><p>{summary}</p>{detail}<p><small>Reference: {reference}</small></p>\
             <p><a href=\"/garments\">Back to garments</a></p></body></html>",
            code = status,
            summary = error.user_message(),
            reference = tera::escape_html(error.correlation_id()),
        );

        (status, Html(body)).into_response()
    }
}

fn correlation_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn render(templates: &Tera, name: &str, context: &Context) -> Result<Html<String>, PageError> {
    templates.render(name, context).map(Html).map_err(|e| {
        error!(template = name, error = ?e, "template rendering failed");
        PageError::internal(format!("template `{name}` failed to render"))
    })
}

fn category_names() -> Vec<&'static str> {
    Category::ALL.iter().map(Category::as_str).collect()
}

/// Urlencoded form body whose rejection renders as the HTML error page.
pub struct PageForm<T>(pub T);

impl<S, T> FromRequest<S> for PageForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = PageError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Form::<T>::from_request(req, state)
            .await
            .map(|Form(value)| Self(value))
            .map_err(|rejection| PageError::bad_request(rejection.body_text()))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MethodOverride {
    #[serde(rename = "_method")]
    pub method: Option<String>,
}

impl MethodOverride {
    fn is_delete(&self) -> bool {
        self.method.as_deref().is_some_and(|method| method.eq_ignore_ascii_case("DELETE"))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
}

async fn liveness() -> &'static str {
    LIVENESS_MESSAGE
}

async fn list_garments(State(state): State<InventoryState>) -> Result<Html<String>, PageError> {
    let garments = state.inventory.garments.list().await?;

    let mut context = Context::new();
    context.insert("garments", &garments);
    render(&state.templates, "garment/index.html", &context)
}

async fn new_garment_form(State(state): State<InventoryState>) -> Result<Html<String>, PageError> {
    render(&state.templates, "garment/create.html", &Context::new())
}

async fn create_garment(
    State(state): State<InventoryState>,
    PageForm(input): PageForm<NewGarment>,
) -> Result<Redirect, PageError> {
    state.inventory.garments.create(&input).await?;
    Ok(Redirect::to("/garments"))
}

async fn show_garment(
    UrlPath(id): UrlPath<String>,
    State(state): State<InventoryState>,
) -> Result<Html<String>, PageError> {
    let resolved = state.inventory.garments.get_with_products(&GarmentId(id)).await?;

    let mut context = Context::new();
    context.insert("garment", &resolved.garment);
    context.insert("products", &resolved.products);
    render(&state.templates, "garment/show.html", &context)
}

async fn delete_garment(
    UrlPath(id): UrlPath<String>,
    State(state): State<InventoryState>,
) -> Result<Redirect, PageError> {
    let report = state.inventory.garments.delete(&GarmentId(id)).await?;

    info!(
        event_name = "inventory.request.garment_deleted",
        garment_id = %report.garment.id,
        purged = report.purge.removed(),
        "garment delete request completed"
    );
    Ok(Redirect::to("/garments"))
}

async fn override_garment_method(
    path: UrlPath<String>,
    state: State<InventoryState>,
    Query(method): Query<MethodOverride>,
) -> Result<Redirect, PageError> {
    if !method.is_delete() {
        return Err(PageError::bad_request("POST to a garment requires `_method=DELETE`"));
    }
    delete_garment(path, state).await
}

async fn new_product_form(
    UrlPath(id): UrlPath<String>,
    State(state): State<InventoryState>,
) -> Result<Html<String>, PageError> {
    let garment = state.inventory.garments.get(&GarmentId(id)).await?;

    let mut context = Context::new();
    context.insert("garment_id", &garment.id);
    context.insert("categories", &category_names());
    render(&state.templates, "product/create.html", &context)
}

async fn create_product_under_garment(
    UrlPath(id): UrlPath<String>,
    State(state): State<InventoryState>,
    PageForm(input): PageForm<NewProduct>,
) -> Result<Redirect, PageError> {
    let garment_id = GarmentId(id);
    state.inventory.products.create_under_garment(&garment_id, &input).await?;
    Ok(Redirect::to(&format!("/garments/{garment_id}")))
}

async fn list_products(
    State(state): State<InventoryState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Html<String>, PageError> {
    let category = filter.category.filter(|value| !value.is_empty());
    let products = state.inventory.products.list(category.as_deref()).await?;

    let mut context = Context::new();
    context.insert("products", &products);
    context.insert("category", category.as_deref().unwrap_or("All"));
    context.insert("categories", &category_names());
    render(&state.templates, "product/index.html", &context)
}

async fn create_product(
    State(state): State<InventoryState>,
    PageForm(input): PageForm<NewProduct>,
) -> Result<Redirect, PageError> {
    let id = state.inventory.products.create(&input).await?;
    Ok(Redirect::to(&format!("/products/{id}")))
}

async fn show_product(
    UrlPath(id): UrlPath<String>,
    State(state): State<InventoryState>,
) -> Result<Html<String>, PageError> {
    let resolved = state.inventory.products.get_with_garment(&ProductId(id)).await?;

    let mut context = Context::new();
    context.insert("product", &resolved.product);
    context.insert("garment", &resolved.garment);
    render(&state.templates, "product/show.html", &context)
}

async fn delete_product(
    UrlPath(id): UrlPath<String>,
    State(state): State<InventoryState>,
) -> Result<Redirect, PageError> {
    state.inventory.products.delete(&ProductId(id)).await?;
    Ok(Redirect::to("/products"))
}

async fn override_product_method(
    path: UrlPath<String>,
    state: State<InventoryState>,
    Query(method): Query<MethodOverride>,
) -> Result<Redirect, PageError> {
    if !method.is_delete() {
        return Err(PageError::bad_request("POST to a product requires `_method=DELETE`"));
    }
    delete_product(path, state).await
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        extract::{Path as UrlPath, Query, State},
        http::{header, Method, Request, StatusCode},
        response::IntoResponse,
        Router,
    };
    use tower::ServiceExt;

    use factory_core::domain::garment::NewGarment;
    use factory_core::domain::product::NewProduct;
    use factory_db::{connect_with_settings, migrations, Inventory};

    use super::{
        init_templates, list_products, router, show_garment, InventoryState, ProductFilter,
        EMBEDDED_TEMPLATES, LIVENESS_MESSAGE,
    };

    fn state(inventory: Inventory) -> InventoryState {
        InventoryState { inventory, templates: init_templates(None) }
    }

    async fn sqlite_inventory() -> Inventory {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        Inventory::new(pool)
    }

    fn summer_line() -> NewGarment {
        NewGarment {
            name: Some("Summer Line".to_string()),
            location: Some("Bandung".to_string()),
            contact: Some("082xxx".to_string()),
        }
    }

    async fn send(app: &Router, method: Method, uri: &str, form: Option<&str>) -> (StatusCode, Option<String>, String) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match form {
            Some(form) => {
                builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
                Body::from(form.to_string())
            }
            None => Body::empty(),
        };

        let response =
            app.clone().oneshot(builder.body(body).expect("request")).await.expect("response");
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, location, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[test]
    fn embedded_templates_are_all_registered() {
        let templates = init_templates(None);
        let names: Vec<&str> = templates.get_template_names().collect();

        for (name, _) in EMBEDDED_TEMPLATES {
            assert!(names.contains(&name), "missing template {name}");
        }
    }

    #[tokio::test]
    async fn root_reports_liveness() {
        let app = router(state(Inventory::in_memory()));

        let (status, _, body) = send(&app, Method::GET, "/", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, LIVENESS_MESSAGE);
    }

    #[tokio::test]
    async fn garment_form_post_redirects_and_lists_new_garment() {
        let app = router(state(Inventory::in_memory()));

        let (status, _, body) = send(&app, Method::GET, "/garments", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("No garments yet"));

        let (status, location, _) = send(
            &app,
            Method::POST,
            "/garments",
            Some("name=Summer+Line&location=&contact=082xxx"),
        )
        .await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/garments"));

        let (_, _, body) = send(&app, Method::GET, "/garments", None).await;
        assert!(body.contains("Summer Line"));
    }

    #[tokio::test]
    async fn invalid_garment_form_renders_bad_request_without_redirect() {
        let inventory = Inventory::in_memory();
        let app = router(state(inventory.clone()));

        let (status, location, body) =
            send(&app, Method::POST, "/garments", Some("name=Summer+Line&contact=")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(location.is_none());
        assert!(body.contains("`contact` is required"));
        assert!(inventory.garments.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn unreadable_form_body_renders_bad_request_page() {
        let inventory = Inventory::in_memory();
        let app = router(state(inventory.clone()));

        for uri in ["/garments", "/products"] {
            let request = Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("name=Summer+Line&contact=082xxx"))
                .expect("request");
            let response = app.clone().oneshot(request).await.expect("response");

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert!(response.headers().get(header::LOCATION).is_none(), "{uri}");
            let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
            let body = String::from_utf8_lossy(&bytes);
            assert!(body.contains("<h1>400 Bad Request</h1>"), "{uri}: {body}");
            assert!(body.contains("Reference:"), "{uri}");
        }

        assert!(inventory.garments.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn summer_line_scenario_over_http() {
        let inventory = sqlite_inventory().await;
        let app = router(state(inventory.clone()));
        let garment_id = inventory.garments.create(&summer_line()).await.expect("garment");

        let (status, location, _) = send(
            &app,
            Method::POST,
            &format!("/garments/{garment_id}/product"),
            Some("name=T-Shirt&brand=X&price=50000&color=White&category=Baju"),
        )
        .await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location, Some(format!("/garments/{garment_id}")));

        let (status, _, body) =
            send(&app, Method::GET, &format!("/garments/{garment_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("T-Shirt"));

        let product_id = inventory.products.list(None).await.expect("products")[0].id.clone();
        let (status, _, body) =
            send(&app, Method::GET, &format!("/products/{product_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Summer Line"));

        let (status, location, _) =
            send(&app, Method::POST, &format!("/garments/{garment_id}?_method=DELETE"), None).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/garments"));

        let (status, _, _) =
            send(&app, Method::GET, &format!("/products/{product_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn nested_product_with_unknown_category_is_rejected() {
        let inventory = Inventory::in_memory();
        let app = router(state(inventory.clone()));
        let garment_id = inventory.garments.create(&summer_line()).await.expect("garment");

        let (status, location, _) = send(
            &app,
            Method::POST,
            &format!("/garments/{garment_id}/product"),
            Some("name=T-Shirt&brand=X&price=50000&color=White&category=Shoes"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(location.is_none());
        assert!(inventory.products.list(None).await.expect("products").is_empty());
    }

    #[tokio::test]
    async fn standalone_product_redirects_to_its_page() {
        let inventory = Inventory::in_memory();
        let app = router(state(inventory.clone()));
        let garment_id = inventory.garments.create(&summer_line()).await.expect("garment");

        let (status, location, _) = send(
            &app,
            Method::POST,
            "/products",
            Some(&format!("name=Cap&brand=Y&price=15000&color=Red&garment={garment_id}")),
        )
        .await;

        assert_eq!(status, StatusCode::SEE_OTHER);
        let location = location.expect("location");
        assert!(location.starts_with("/products/"));

        let (status, _, body) = send(&app, Method::GET, &location, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Cap"));
        assert!(body.contains("Uncategorized"));
    }

    #[tokio::test]
    async fn delete_product_by_method_and_override() {
        let inventory = Inventory::in_memory();
        let app = router(state(inventory.clone()));
        let garment_id = inventory.garments.create(&summer_line()).await.expect("garment");
        let input = NewProduct {
            name: Some("T-Shirt".to_string()),
            brand: Some("X".to_string()),
            price: Some("50000".to_string()),
            color: Some("White".to_string()),
            category: None,
            garment: None,
        };
        let first = inventory.products.create_under_garment(&garment_id, &input).await.expect("p1");
        let second =
            inventory.products.create_under_garment(&garment_id, &input).await.expect("p2");

        let (status, location, _) =
            send(&app, Method::DELETE, &format!("/products/{first}"), None).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/products"));

        let (status, _, _) =
            send(&app, Method::POST, &format!("/products/{second}?_method=delete"), None).await;
        assert_eq!(status, StatusCode::SEE_OTHER);

        let (status, _, _) = send(&app, Method::DELETE, &format!("/products/{first}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, body) =
            send(&app, Method::GET, &format!("/garments/{garment_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("This garment has no products"));
    }

    #[tokio::test]
    async fn post_without_method_override_is_rejected() {
        let inventory = Inventory::in_memory();
        let app = router(state(inventory.clone()));
        let garment_id = inventory.garments.create(&summer_line()).await.expect("garment");

        let (status, _, _) = send(&app, Method::POST, &format!("/garments/{garment_id}"), None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(inventory.garments.list().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn unknown_garment_renders_not_found_page() {
        let response =
            show_garment(UrlPath("G-missing".to_string()), State(state(Inventory::in_memory())))
                .await
                .expect_err("missing garment")
                .into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn product_index_names_the_filter_or_all() {
        let inventory = Inventory::in_memory();
        let garment_id = inventory.garments.create(&summer_line()).await.expect("garment");
        let input = NewProduct {
            name: Some("T-Shirt".to_string()),
            brand: Some("X".to_string()),
            price: Some("50000".to_string()),
            color: Some("White".to_string()),
            category: Some("Baju".to_string()),
            garment: None,
        };
        inventory.products.create_under_garment(&garment_id, &input).await.expect("product");

        let all = list_products(State(state(inventory.clone())), Query(ProductFilter::default()))
            .await
            .expect("all products");
        assert!(all.0.contains("All Products"));
        assert!(all.0.contains("T-Shirt"));

        let jaket = list_products(
            State(state(inventory.clone())),
            Query(ProductFilter { category: Some("Jaket".to_string()) }),
        )
        .await
        .expect("jaket products");
        assert!(jaket.0.contains("Jaket Products"));
        assert!(jaket.0.contains("No products found"));
    }
}
