//! Which screens the current session may open.

use serde::Serialize;

use crate::session::{Role, SessionState};

pub const LOGIN_PATH: &str = "/login";
pub const SELECT_LOCATION_PATH: &str = "/select-local";
pub const MY_SHIFT_PATH: &str = "/mi-turno";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    SelectLocation,
    MyShift,
    Dashboard,
    AllShifts,
    ShiftDetail,
    Locations,
    Employees,
    Expenses,
    Suppliers,
    Reports,
    Settings,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::SelectLocation => SELECT_LOCATION_PATH,
            Route::MyShift => MY_SHIFT_PATH,
            Route::Dashboard => "/mi-negocio",
            Route::AllShifts => "/todos-los-turnos",
            Route::ShiftDetail => "/turno",
            Route::Locations => "/locales",
            Route::Employees => "/empleados",
            Route::Expenses => "/gastos",
            Route::Suppliers => "/proveedores",
            Route::Reports => "/informes",
            Route::Settings => "/configuracion",
        }
    }

    fn employee_allowed(&self) -> bool {
        matches!(self, Route::MyShift | Route::SelectLocation)
    }

    /// Managing locations and choosing one work without a selection.
    fn needs_location(&self) -> bool {
        !matches!(self, Route::SelectLocation | Route::Locations)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum Access {
    Allowed,
    RedirectTo(&'static str),
}

pub fn can_access(route: Route, session: &SessionState) -> Access {
    let Some(user) = session.current_user() else {
        return Access::RedirectTo(LOGIN_PATH);
    };
    if user.role != Role::Manager && !route.employee_allowed() {
        return Access::RedirectTo(MY_SHIFT_PATH);
    }
    if route.needs_location() && session.selected_location().is_none() {
        return Access::RedirectTo(SELECT_LOCATION_PATH);
    }
    Access::Allowed
}
