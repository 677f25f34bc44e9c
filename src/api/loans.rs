//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        loan::{
            CreateLoan, Loan, LoanDetails, LoanQuery, PopularityEntry, ReturnLoan, TopQuery,
            UpcomingQuery,
        },
        page_of, per_page_of,
    },
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

/// List loans
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans, newest first", body = PaginatedResponse<LoanDetails>)
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<PaginatedResponse<LoanDetails>>> {
    let (loans, total) = state.services.loans.list_loans(&query).await?;

    Ok(Json(PaginatedResponse {
        items: loans,
        total,
        page: page_of(query.page),
        per_page: per_page_of(query.per_page),
    }))
}

/// Get a loan with client and book summary
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<LoanDetails>> {
    Ok(Json(state.services.loans.get_loan(id).await?))
}

/// Loans of one client
#[utoipa::path(
    get,
    path = "/loans/client/{client_id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("client_id" = i64, Path, description = "Client ID")
    ),
    responses(
        (status = 200, description = "Client loans, newest first", body = Vec<LoanDetails>)
    )
)]
pub async fn get_client_loans(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(client_id): Path<i64>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    Ok(Json(state.services.loans.client_loans(client_id).await?))
}

/// Lend a book to a client
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 404, description = "Client or book not found"),
        (status = 422, description = "Book not available or loan limit reached", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    request.validate()?;

    let loan = state.services.loans.create_loan(claims.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    request_body = ReturnLoan,
    responses(
        (status = 200, description = "Loan returned", body = Loan),
        (status = 404, description = "Loan not found"),
        (status = 422, description = "Loan already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i64>,
    Json(request): Json<ReturnLoan>,
) -> AppResult<Json<Loan>> {
    request.validate()?;

    let loan = state
        .services
        .loans
        .return_loan(claims.user_id, loan_id, request)
        .await?;
    Ok(Json(loan))
}

/// Active loans past their due day
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue loans, earliest due first", body = Vec<LoanDetails>)
    )
)]
pub async fn overdue_loans(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    Ok(Json(state.services.loans.overdue().await?))
}

/// Active loans due soon
#[utoipa::path(
    get,
    path = "/loans/upcoming",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(UpcomingQuery),
    responses(
        (status = 200, description = "Loans due within the window", body = Vec<LoanDetails>)
    )
)]
pub async fn upcoming_loans(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<UpcomingQuery>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    Ok(Json(state.services.loans.upcoming(&query).await?))
}

#[utoipa::path(
    get,
    path = "/loans/top/books",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(TopQuery),
    responses(
        (status = 200, description = "Most borrowed books", body = Vec<PopularityEntry>)
    )
)]
pub async fn top_books(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<TopQuery>,
) -> AppResult<Json<Vec<PopularityEntry>>> {
    Ok(Json(state.services.loans.top_books(&query).await?))
}

#[utoipa::path(
    get,
    path = "/loans/top/authors",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(TopQuery),
    responses(
        (status = 200, description = "Most borrowed authors", body = Vec<PopularityEntry>)
    )
)]
pub async fn top_authors(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<TopQuery>,
) -> AppResult<Json<Vec<PopularityEntry>>> {
    Ok(Json(state.services.loans.top_authors(&query).await?))
}

#[utoipa::path(
    get,
    path = "/loans/top/categories",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(TopQuery),
    responses(
        (status = 200, description = "Most borrowed categories", body = Vec<PopularityEntry>)
    )
)]
pub async fn top_categories(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<TopQuery>,
) -> AppResult<Json<Vec<PopularityEntry>>> {
    Ok(Json(state.services.loans.top_categories(&query).await?))
}

#[utoipa::path(
    get,
    path = "/loans/top/clients",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(TopQuery),
    responses(
        (status = 200, description = "Clients with the most loans", body = Vec<PopularityEntry>)
    )
)]
pub async fn top_clients(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<TopQuery>,
) -> AppResult<Json<Vec<PopularityEntry>>> {
    Ok(Json(state.services.loans.top_clients(&query).await?))
}

#[utoipa::path(
    get,
    path = "/loans/top/books/author/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Author ID"),
        TopQuery
    ),
    responses(
        (status = 200, description = "Most borrowed books of the author", body = Vec<PopularityEntry>),
        (status = 404, description = "Author not found")
    )
)]
pub async fn top_books_by_author(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(author_id): Path<i64>,
    Query(query): Query<TopQuery>,
) -> AppResult<Json<Vec<PopularityEntry>>> {
    Ok(Json(
        state
            .services
            .loans
            .top_books_by_author(author_id, &query)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/loans/top/books/category/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Category ID"),
        TopQuery
    ),
    responses(
        (status = 200, description = "Most borrowed books of the category", body = Vec<PopularityEntry>),
        (status = 404, description = "Category not found")
    )
)]
pub async fn top_books_by_category(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(category_id): Path<i64>,
    Query(query): Query<TopQuery>,
) -> AppResult<Json<Vec<PopularityEntry>>> {
    Ok(Json(
        state
            .services
            .loans
            .top_books_by_category(category_id, &query)
            .await?,
    ))
}
