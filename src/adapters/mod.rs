pub mod results_exporter;
