pub mod sales_csv;
