//! Workbook-shaped tables shared by the unit tests.

use crate::models::{Cell, RemoteTable};
use crate::table::MemoryTable;

pub const HISTORY: &str = "table_name_hist";
pub const UNITS: &str = "table_name";

/// History table headers, spelled as in the live workbook.
pub fn history_headers() -> Vec<String> {
    [
        "Id_UE",
        "Nombre Unidad Ejecutora",
        "Año",
        "N G 1",
        "N G 2",
        "Fecha de recepción",
        "Periodo PEI ",
        "Vigencia",
        "Tipo de PEI",
        "Estado ",
        "Responsable Institucional ",
        "Cantidad de revisiones",
        "Fecha de derivación ",
        "Etapas de revisión",
        "Comentario adicional/ Emisor de I.T",
        "Articulación ",
        "Expediente ",
        "Fecha de I.T ",
        "Número de I.T",
        "Fecha Oficio",
        "Número Oficio",
        "Id_Sector",
        "nombre_sector",
        "Id_Pliego",
        "nombre_pliego",
        "Observaciones internas",
        "IdRegistro",
        "LastUpdated",
        "UpdatedBy",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect()
}

pub fn units_headers() -> Vec<String> {
    [
        "Id_UE",
        "Nombre Unidad Ejecutora",
        "N G 1",
        "nombre_sector",
        "nombre_departamento",
        "Responsable Institucional ",
        "Unnamed: 6",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect()
}

fn history_row(values: &[(&str, Cell)]) -> Vec<Cell> {
    let headers = history_headers();
    let mut row = vec![Cell::Empty; headers.len()];
    for (header, value) in values {
        if let Some(position) = headers.iter().position(|h| h == header) {
            row[position] = value.clone();
        }
    }
    row
}

/// Both tables, with three history rows for unit 123 (one without a
/// reception date) and one for unit 456.
pub fn sample_store() -> MemoryTable {
    let history = RemoteTable::new(
        history_headers(),
        vec![
            history_row(&[
                ("Id_UE", Cell::Number(123.0)),
                ("Fecha de recepción", Cell::text("2024-02-01")),
                ("Periodo PEI ", Cell::text("2024-2026")),
                ("Estado ", Cell::text("en_proceso")),
                ("IdRegistro", Cell::text("id-1")),
            ]),
            history_row(&[
                ("Id_UE", Cell::text("123")),
                ("Fecha de recepción", Cell::Number(45366.0)),
                ("Periodo PEI ", Cell::text("2025-2027")),
                ("Estado ", Cell::text("En proceso")),
                ("Etapas de revisión", Cell::text("Revision DNCP")),
                ("Observaciones internas", Cell::text("no tocar")),
                ("IdRegistro", Cell::text("id-2")),
            ]),
            history_row(&[
                ("Id_UE", Cell::text("456")),
                ("Fecha de recepción", Cell::text("2025-01-10")),
                ("Periodo PEI ", Cell::text("2025-2027")),
                ("Estado ", Cell::text("Emitido")),
                ("IdRegistro", Cell::text("id-3")),
            ]),
            history_row(&[
                ("Id_UE", Cell::text("123.0")),
                ("Periodo PEI ", Cell::text("2023-2025")),
                ("IdRegistro", Cell::text("id-4")),
            ]),
        ],
    );

    let units = RemoteTable::new(
        units_headers(),
        vec![
            vec![
                Cell::Number(123.0),
                Cell::text("Municipalidad de Ejemplo"),
                Cell::text("Municipalidad distrital"),
                Cell::text("Gobiernos locales"),
                Cell::text("Cusco"),
                Cell::text("Rosa Quispe"),
            ],
            vec![
                Cell::text("456"),
                Cell::text("Ministerio de Ejemplo"),
                Cell::text("Gobierno nacional"),
                Cell::text("Economía"),
                Cell::text("Lima"),
                Cell::text("Ana Torres"),
            ],
        ],
    );

    MemoryTable::new().with_table(HISTORY, history).with_table(UNITS, units)
}
