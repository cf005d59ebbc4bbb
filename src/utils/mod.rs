pub mod multierr;
